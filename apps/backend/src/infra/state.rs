use std::sync::Arc;

use db_infra::db::{DbKind, RuntimeEnv};

use crate::config::arena::ArenaConfig;
use crate::error::AppError;
use crate::infra::db::bootstrap_db;
use crate::services::ledger::{LoggingGateway, PaymentGateway};
use crate::state::app_state::AppState;

/// Builder for creating AppState instances (used in both tests and main)
pub struct StateBuilder {
    env: RuntimeEnv,
    kind: DbKind,
    config: Option<ArenaConfig>,
    gateway: Arc<dyn PaymentGateway>,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self {
            env: RuntimeEnv::Test,
            kind: DbKind::SqliteMemory,
            config: None,
            gateway: Arc::new(LoggingGateway),
        }
    }

    pub fn with_env(mut self, env: RuntimeEnv) -> Self {
        self.env = env;
        self
    }

    pub fn with_db(mut self, kind: DbKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_config(mut self, config: ArenaConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub async fn build(self) -> Result<AppState, AppError> {
        let config = match self.config {
            Some(config) => {
                config.validate()?;
                config
            }
            None => ArenaConfig::from_env()?,
        };
        // single entrypoint: build + migrate
        let conn = bootstrap_db(self.env, self.kind).await?;
        Ok(AppState::new(conn, config, self.gateway))
    }
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_state() -> StateBuilder {
    StateBuilder::new()
}
