use db_infra::db::{DbKind, RuntimeEnv};
use db_infra::{build_app_pool, orchestrate_migration, orchestrate_migration_internal};
use migration::MigrationCommand;
use sea_orm::DatabaseConnection;
use tracing::info;

use crate::error::AppError;

/// Open the runtime pool and bring the schema up to date.
pub async fn bootstrap_db(env: RuntimeEnv, kind: DbKind) -> Result<DatabaseConnection, AppError> {
    let pool = build_app_pool(env, kind).await?;
    match kind {
        // every new connection to sqlite::memory: is an empty database
        DbKind::SqliteMemory => {
            orchestrate_migration_internal(&pool, env, kind, MigrationCommand::Up).await?
        }
        DbKind::Postgres | DbKind::SqliteFile => {
            orchestrate_migration(env, kind, MigrationCommand::Up).await?
        }
    }
    info!(env = ?env, db_kind = ?kind, "database ready");
    Ok(pool)
}
