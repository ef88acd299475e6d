use std::env;
use std::env::VarError;
use std::str::FromStr;
use std::sync::Arc;

use arena::config::arena::ArenaConfig;
use arena::events::{EventSink, RecordingSink};
use arena::infra::db::bootstrap_db;
use arena::services::ledger::{LedgerService, RecordingGateway};
use arena::services::matchmaking::Coordinator;
use arena::services::sessions::SessionManager;
use arena::AppError;
use db_infra::db::{DbKind, RuntimeEnv};
use sea_orm::DatabaseConnection;

/// Everything a service test touches, wired with recording doubles.
pub struct TestArena {
    pub db: DatabaseConnection,
    pub config: Arc<ArenaConfig>,
    pub events: Arc<RecordingSink>,
    pub gateway: Arc<RecordingGateway>,
    pub ledger: LedgerService,
    pub sessions: Arc<SessionManager>,
    pub coordinator: Arc<Coordinator>,
}

fn read_env_db_kind() -> Result<Option<String>, AppError> {
    match env::var("ARENA_TEST_DB_KIND") {
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(err) => Err(AppError::config(format!(
            "failed to read ARENA_TEST_DB_KIND: {err}"
        ))),
    }
}

pub fn resolve_test_db_kind() -> Result<DbKind, AppError> {
    match read_env_db_kind()? {
        Some(raw) => Ok(DbKind::from_str(raw.as_str())?),
        None => Ok(DbKind::SqliteMemory),
    }
}

pub async fn build_test_arena() -> Result<TestArena, AppError> {
    build_test_arena_with(ArenaConfig::for_tests()).await
}

/// Fresh migrated store plus services sharing one recording sink.
pub async fn build_test_arena_with(config: ArenaConfig) -> Result<TestArena, AppError> {
    config.validate()?;
    let db = bootstrap_db(RuntimeEnv::Test, resolve_test_db_kind()?).await?;
    Ok(wire(db, config))
}

/// Services over an existing store; used to simulate a restart.
pub fn wire(db: DatabaseConnection, config: ArenaConfig) -> TestArena {
    let config = Arc::new(config);
    let events = Arc::new(RecordingSink::new());
    let sink: Arc<dyn EventSink> = events.clone();
    let gateway = Arc::new(RecordingGateway::default());
    let ledger = LedgerService::new(db.clone(), config.retry.clone(), gateway.clone());
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
    TestArena {
        db,
        config,
        events,
        gateway,
        ledger,
        sessions,
        coordinator,
    }
}
