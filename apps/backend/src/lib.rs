#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

pub mod ai;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod error;
pub mod errors;
pub mod events;
pub mod health;
pub mod infra;
pub mod logging;
pub mod repos;
pub mod services;
pub mod state;

// Re-exports for public API
pub use config::arena::ArenaConfig;
pub use error::AppError;
pub use errors::domain::DomainError;
pub use events::{ArenaEvent, EventHub, EventSink, RecordingSink};
pub use infra::db::bootstrap_db;
pub use infra::state::build_state;
pub use services::ledger::LedgerService;
pub use services::matchmaking::Coordinator;
pub use services::sessions::SessionManager;
pub use state::app_state::AppState;

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    backend_test_support::logging::init();
}
