//! Infrastructure layer - database bootstrap, retries, state and workers.

pub mod db;
pub mod db_errors;
pub mod retry;
pub mod state;
pub mod workers;
