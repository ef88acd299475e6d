use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sea_orm::DatabaseBackend;

use crate::error::DbInfraError;

/// Which deployment a process is running as. Test mode enforces naming
/// rules so a test run can never touch the production database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnv {
    Prod,
    Test,
}

/// Storage engine backing the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Postgres,
    SqliteFile,
    SqliteMemory,
}

/// Credential set used to open a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOwner {
    /// Runtime access (DML only)
    App,
    /// Schema owner, used for migrations
    Owner,
}

/// What a pool is going to be used for; drives sizing and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPurpose {
    Runtime,
    Migration,
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl FromStr for RuntimeEnv {
    type Err = DbInfraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "prod" | "production" => Ok(Self::Prod),
            "test" => Ok(Self::Test),
            other => Err(DbInfraError::config(format!(
                "unknown runtime env '{other}' (expected prod|test)"
            ))),
        }
    }
}

impl FromStr for DbKind {
    type Err = DbInfraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "sqlite-file" | "sqlite" => Ok(Self::SqliteFile),
            "sqlite-memory" | "memory" => Ok(Self::SqliteMemory),
            other => Err(DbInfraError::config(format!(
                "unknown db kind '{other}' (expected postgres|sqlite-file|sqlite-memory)"
            ))),
        }
    }
}

impl From<DbKind> for DatabaseBackend {
    fn from(kind: DbKind) -> Self {
        match kind {
            DbKind::Postgres => DatabaseBackend::Postgres,
            DbKind::SqliteFile | DbKind::SqliteMemory => DatabaseBackend::Sqlite,
        }
    }
}

/// Builds the connection string for the given env/kind/owner from environment variables.
pub fn make_conn_spec(
    env: RuntimeEnv,
    kind: DbKind,
    owner: DbOwner,
) -> Result<String, DbInfraError> {
    match kind {
        DbKind::Postgres => {
            let host = env::var("POSTGRES_HOST").unwrap_or_else(|_| "localhost".to_string());
            let port = env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".to_string());
            let db_name = pg_db_name(env)?;
            let (user, password) = credentials(owner)?;
            let password = utf8_percent_encode(&password, NON_ALPHANUMERIC);
            Ok(format!(
                "postgresql://{user}:{password}@{host}:{port}/{db_name}"
            ))
        }
        DbKind::SqliteFile => {
            let path = sqlite_db_path(env)?;
            Ok(format!("sqlite://{}?mode=rwc", path.display()))
        }
        DbKind::SqliteMemory => Ok("sqlite::memory:".to_string()),
    }
}

/// Rejects combinations that could point a test run at production data.
pub fn validate_db_config(env: RuntimeEnv, kind: DbKind) -> Result<(), DbInfraError> {
    if env == RuntimeEnv::Prod && kind == DbKind::SqliteMemory {
        return Err(DbInfraError::config(
            "in-memory sqlite is only allowed in the test environment",
        ));
    }
    if kind == DbKind::Postgres {
        pg_db_name(env)?;
    }
    Ok(())
}

pub fn pool_settings(env: RuntimeEnv, kind: DbKind, purpose: PoolPurpose) -> PoolSettings {
    match (kind, purpose) {
        // Every connection to sqlite::memory: is a separate database.
        (DbKind::SqliteMemory, _) => PoolSettings {
            min_connections: 1,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
        },
        (_, PoolPurpose::Migration) => PoolSettings {
            min_connections: 1,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(2),
        },
        (DbKind::SqliteFile, PoolPurpose::Runtime) => PoolSettings {
            min_connections: 1,
            max_connections: 4,
            acquire_timeout: Duration::from_secs(5),
        },
        (DbKind::Postgres, PoolPurpose::Runtime) => {
            let max = match env {
                RuntimeEnv::Test => 4,
                RuntimeEnv::Prod => (num_cpus::get() as u32 * 4).clamp(4, 64),
            };
            PoolSettings {
                min_connections: 1,
                max_connections: max,
                acquire_timeout: Duration::from_secs(5),
            }
        }
    }
}

/// Per-connection statements applied before migrating.
pub fn build_session_statements(kind: DbKind) -> Vec<String> {
    match kind {
        DbKind::Postgres => vec![
            "SET lock_timeout = '5s'".to_string(),
            "SET statement_timeout = '120s'".to_string(),
        ],
        DbKind::SqliteFile => vec![
            "PRAGMA journal_mode = WAL;".to_string(),
            "PRAGMA synchronous = NORMAL;".to_string(),
            "PRAGMA busy_timeout = 5000;".to_string(),
            "PRAGMA foreign_keys = ON;".to_string(),
        ],
        DbKind::SqliteMemory => vec!["PRAGMA foreign_keys = ON;".to_string()],
    }
}

pub fn sqlite_db_path(env: RuntimeEnv) -> Result<PathBuf, DbInfraError> {
    let var = match env {
        RuntimeEnv::Prod => "ARENA_SQLITE_PATH",
        RuntimeEnv::Test => "ARENA_TEST_SQLITE_PATH",
    };
    let default = match env {
        RuntimeEnv::Prod => "./data/arena.db",
        RuntimeEnv::Test => "./data/arena_test.db",
    };
    let path = env::var(var).unwrap_or_else(|_| default.to_string());
    if path.trim().is_empty() {
        return Err(DbInfraError::config(format!("{var} is set but empty")));
    }
    Ok(PathBuf::from(path))
}

/// Lock file shared by every process migrating the same sqlite file.
pub fn sqlite_lock_path(env: RuntimeEnv) -> Result<PathBuf, DbInfraError> {
    let mut path = sqlite_db_path(env)?.into_os_string();
    path.push(".migrate.lock");
    Ok(PathBuf::from(path))
}

fn pg_db_name(env: RuntimeEnv) -> Result<String, DbInfraError> {
    match env {
        RuntimeEnv::Prod => must_var("ARENA_PROD_DB"),
        RuntimeEnv::Test => {
            let name = must_var("ARENA_TEST_DB")?;
            if !name.ends_with("_test") {
                return Err(DbInfraError::config(format!(
                    "Test env requires database name to end with '_test', but got: '{name}'"
                )));
            }
            Ok(name)
        }
    }
}

fn credentials(owner: DbOwner) -> Result<(String, String), DbInfraError> {
    match owner {
        DbOwner::App => Ok((
            must_var("ARENA_APP_DB_USER")?,
            must_var("ARENA_APP_DB_PASSWORD")?,
        )),
        DbOwner::Owner => Ok((
            must_var("ARENA_OWNER_DB_USER")?,
            must_var("ARENA_OWNER_DB_PASSWORD")?,
        )),
    }
}

fn must_var(name: &str) -> Result<String, DbInfraError> {
    env::var(name).map_err(|_| {
        DbInfraError::config(format!("Required environment variable '{name}' is not set"))
    })
}
