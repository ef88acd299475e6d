use std::future::Future;
use std::time::{Duration, Instant};

use migration::{migrate, MigrationCommand, Migrator, MigratorTrait};
use rand::Rng;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::config::db::{
    build_session_statements, make_conn_spec, pool_settings, sqlite_lock_path,
    validate_db_config, DbKind, DbOwner, PoolPurpose, RuntimeEnv,
};
use crate::error::DbInfraError;
use crate::infra::db::locking::{
    BootstrapLock, Guard, InMemoryLock, PgAdvisoryLock, SqliteFileLock,
};

const MIGRATION_BODY_TIMEOUT: Duration = Duration::from_secs(120);

async fn retry_connection<T, F, Fut>(
    mut connect_fn: F,
    max_attempts: u32,
    interval_ms: u64,
) -> Result<T, DbInfraError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbInfraError>>,
{
    let mut attempt = 1;
    loop {
        match connect_fn().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(attempts = attempt, "connection retry succeeded");
                }
                return Ok(result);
            }
            Err(e) if attempt >= max_attempts => return Err(e),
            Err(e) => {
                warn!(attempt, max_attempts, interval_ms, error = %e, "connection attempt failed");
                tokio::time::sleep(Duration::from_millis(interval_ms)).await;
                attempt += 1;
            }
        }
    }
}

async fn connect(
    env: RuntimeEnv,
    kind: DbKind,
    owner: DbOwner,
    purpose: PoolPurpose,
) -> Result<DatabaseConnection, DbInfraError> {
    let url = make_conn_spec(env, kind, owner)?;
    let settings = pool_settings(env, kind, purpose);

    let mut opt = ConnectOptions::new(&url);
    opt.min_connections(settings.min_connections)
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout)
        .sqlx_logging(false);

    let attempts = if kind == DbKind::Postgres { 5 } else { 1 };
    retry_connection(
        || {
            let opt = opt.clone();
            async move {
                Database::connect(opt)
                    .await
                    .map_err(|e| DbInfraError::Connect {
                        message: format!("failed to connect ({kind:?}, {purpose:?}): {e}"),
                    })
            }
        },
        attempts,
        500,
    )
    .await
}

/// Single-connection owner pool used to hold the migration lock.
pub async fn build_admin_pool(
    env: RuntimeEnv,
    kind: DbKind,
) -> Result<DatabaseConnection, DbInfraError> {
    connect(env, kind, DbOwner::Owner, PoolPurpose::Migration).await
}

/// Runtime pool for the service itself.
pub async fn build_app_pool(
    env: RuntimeEnv,
    kind: DbKind,
) -> Result<DatabaseConnection, DbInfraError> {
    validate_db_config(env, kind)?;
    // in-memory sqlite has no credentials and no separate owner
    let owner = match kind {
        DbKind::SqliteMemory | DbKind::SqliteFile => DbOwner::Owner,
        DbKind::Postgres => DbOwner::App,
    };
    let pool = connect(env, kind, owner, PoolPurpose::Runtime).await?;
    if kind != DbKind::Postgres {
        apply_session_statements(&pool, kind).await?;
    }
    Ok(pool)
}

/// Mask the password in a connection string.
pub fn sanitize_db_url(url: &str) -> String {
    match url.rsplit_once('@') {
        Some((auth, host)) => match auth.rfind(':') {
            Some(colon) if colon > auth.find("://").map(|i| i + 2).unwrap_or(0) => {
                format!("{}:***@{}", &auth[..colon], host)
            }
            _ => url.to_string(),
        },
        None => url.to_string(),
    }
}

/// True when every defined migration is already applied.
async fn fast_path_schema_check(conn: &DatabaseConnection) -> Result<bool, DbInfraError> {
    let expected = Migrator::migrations();
    let expected_last = expected.last().map(|m| m.name().to_string());

    let applied = match Migrator::get_applied_migrations(conn).await {
        Ok(m) => m,
        Err(DbErr::Exec(_)) => {
            trace!(fastpath = "miss", reason = "migration_table_missing");
            return Ok(false);
        }
        Err(e) => {
            return Err(DbInfraError::Migration {
                message: format!("failed to read applied migrations: {e}"),
            })
        }
    };
    let applied_last = applied.last().map(|m| m.name().to_string());

    let up_to_date = applied.len() == expected.len()
        && expected_last.is_some()
        && applied_last == expected_last;
    trace!(
        fastpath = if up_to_date { "hit" } else { "miss" },
        applied = applied.len(),
        expected = expected.len()
    );
    Ok(up_to_date)
}

pub async fn orchestrate_migration(
    env: RuntimeEnv,
    kind: DbKind,
    command: MigrationCommand,
) -> Result<(), DbInfraError> {
    validate_db_config(env, kind)?;
    let admin_pool = build_admin_pool(env, kind).await?;
    orchestrate_migration_internal(&admin_pool, env, kind, command).await
}

/// Run `command` against `pool` under the kind-appropriate bootstrap lock.
pub async fn orchestrate_migration_internal(
    pool: &DatabaseConnection,
    env: RuntimeEnv,
    kind: DbKind,
    command: MigrationCommand,
) -> Result<(), DbInfraError> {
    info!(env = ?env, db_kind = ?kind, command = ?command, "migrate start");

    if matches!(command, MigrationCommand::Status) {
        migrate(pool, command)
            .await
            .map_err(|e| DbInfraError::Migration {
                message: format!("status failed: {e}"),
            })?;
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let result = match kind {
        DbKind::Postgres => {
            let url = make_conn_spec(env, kind, DbOwner::Owner)?;
            let key = format!("arena:migrate:{}", sanitize_db_url(&url));
            let lock = PgAdvisoryLock::new(pool.clone(), &key);
            migrate_with_lock(pool, lock, env, kind, command, cancel).await
        }
        DbKind::SqliteFile => {
            let lock = SqliteFileLock::new(&sqlite_lock_path(env)?);
            migrate_with_lock(pool, lock, env, kind, command, cancel).await
        }
        DbKind::SqliteMemory => {
            migrate_with_lock(pool, InMemoryLock, env, kind, command, cancel).await
        }
    };

    info!(ok = result.is_ok(), "migrate done");
    result
}

async fn migrate_with_lock<L>(
    pool: &DatabaseConnection,
    mut lock: L,
    env: RuntimeEnv,
    kind: DbKind,
    command: MigrationCommand,
    cancel: CancellationToken,
) -> Result<(), DbInfraError>
where
    L: BootstrapLock,
{
    let acquire_budget = Duration::from_millis(
        std::env::var("ARENA_MIGRATE_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(match env {
                RuntimeEnv::Test => 3000,
                RuntimeEnv::Prod => 30_000,
            }),
    );
    let start = Instant::now();
    let mut attempts: u32 = 0;

    let guard = loop {
        attempts += 1;

        if matches!(command, MigrationCommand::Up) && fast_path_schema_check(pool).await? {
            info!("migrate skipped, schema up to date");
            return Ok(());
        }

        if let Some(guard) = lock.try_acquire().await? {
            trace!(lock = "won", attempts, elapsed_ms = start.elapsed().as_millis());
            break guard;
        }

        let base_delay_ms = (5u64 << attempts.saturating_sub(1).min(10)).min(80);
        let delay_ms = base_delay_ms + rand::rng().random_range(0..4);
        trace!(lock = "backoff", attempts, delay_ms);

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {
                if start.elapsed() >= acquire_budget {
                    return Err(DbInfraError::Lock {
                        message: format!(
                            "migration lock not acquired after {:?} ({attempts} attempts)",
                            start.elapsed()
                        ),
                    });
                }
            }
            _ = cancel.cancelled() => {
                return Err(DbInfraError::Lock {
                    message: "migration cancelled while waiting for lock".to_string(),
                });
            }
        }
    };

    let result = run_under_guard(pool, kind, command, &cancel).await;
    if let Err(e) = guard.release().await {
        warn!(error = %e, "failed to release migration guard");
    }
    result
}

async fn run_under_guard(
    pool: &DatabaseConnection,
    kind: DbKind,
    command: MigrationCommand,
    cancel: &CancellationToken,
) -> Result<(), DbInfraError> {
    apply_session_statements(pool, kind).await?;

    let start = Instant::now();
    let task_pool = pool.clone();
    let task_command = command.clone();
    let mut task = tokio::spawn(async move { migrate(&task_pool, task_command).await });

    tokio::select! {
        biased;
        joined = &mut task => match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(DbInfraError::Migration { message: e.to_string() }),
            Err(join_err) => return Err(DbInfraError::Migration {
                message: format!("migration task did not complete: {join_err}"),
            }),
        },
        _ = tokio::time::sleep(MIGRATION_BODY_TIMEOUT) => {
            task.abort();
            return Err(DbInfraError::Migration {
                message: format!("migration timed out after {MIGRATION_BODY_TIMEOUT:?}"),
            });
        }
        _ = cancel.cancelled() => {
            task.abort();
            return Err(DbInfraError::Migration { message: "migration cancelled".to_string() });
        }
    }

    let expected = Migrator::migrations().len();
    let applied = Migrator::get_applied_migrations(pool)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    info!(elapsed_ms = start.elapsed().as_millis(), expected, applied, "migrator ran");

    let consistent = match command {
        MigrationCommand::Reset => applied == 0,
        MigrationCommand::Up | MigrationCommand::Fresh | MigrationCommand::Refresh => {
            applied == expected
        }
        MigrationCommand::Down | MigrationCommand::Status => true,
    };
    if !consistent {
        return Err(DbInfraError::Migration {
            message: format!(
                "post-migration check failed for {command:?}: expected {expected}, applied {applied}"
            ),
        });
    }
    Ok(())
}

async fn apply_session_statements(
    pool: &DatabaseConnection,
    kind: DbKind,
) -> Result<(), DbInfraError> {
    let backend = sea_orm::DatabaseBackend::from(kind);
    for stmt in build_session_statements(kind) {
        pool.execute(Statement::from_string(backend, stmt))
            .await
            .map_err(|e| DbInfraError::Config {
                message: format!("failed to apply session settings: {e}"),
            })?;
    }
    Ok(())
}
