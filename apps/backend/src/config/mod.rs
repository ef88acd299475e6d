pub mod arena;
pub mod server;
