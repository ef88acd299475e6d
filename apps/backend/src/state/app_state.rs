use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::arena::ArenaConfig;
use crate::events::{EventHub, EventSink};
use crate::services::ledger::{LedgerService, PaymentGateway};
use crate::services::matchmaking::Coordinator;
use crate::services::sessions::SessionManager;

/// Shared services handed to request handlers and background workers.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<ArenaConfig>,
    pub events: Arc<EventHub>,
    pub ledger: LedgerService,
    pub sessions: Arc<SessionManager>,
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    /// Wire the ledger, session manager and coordinator over one pool.
    pub fn new(
        db: DatabaseConnection,
        config: ArenaConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let config = Arc::new(config);
        let events = Arc::new(EventHub::new());
        let sink: Arc<dyn EventSink> = events.clone();
        let ledger = LedgerService::new(db.clone(), config.retry.clone(), gateway);
        let sessions = Arc::new(SessionManager::new(
            db.clone(),
            Arc::clone(&config),
            Arc::clone(&sink),
        ));
        let coordinator = Arc::new(Coordinator::new(
            db.clone(),
            Arc::clone(&config),
            ledger.clone(),
            Arc::clone(&sessions),
            sink,
        ));
        Self {
            db,
            config,
            events,
            ledger,
            sessions,
            coordinator,
        }
    }
}
