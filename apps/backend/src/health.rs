use actix_web::{web, HttpResponse};
use migration::get_latest_migration_version;
use sea_orm::{ConnectionTrait, Statement};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::warn;

use crate::error::AppError;
use crate::state::app_state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    app_version: &'static str,
    db: &'static str,
    migrations: String,
    live_sessions: usize,
    time: String,
}

async fn health(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let time = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());

    let ping = state
        .db
        .query_one(Statement::from_string(
            state.db.get_database_backend(),
            "SELECT 1 AS health_check".to_string(),
        ))
        .await;

    let (db, migrations) = match ping {
        Ok(_) => {
            let migrations = match get_latest_migration_version(&state.db).await {
                Ok(Some(version)) => version,
                Ok(None) => "no_migrations".to_string(),
                Err(_) => "unknown".to_string(),
            };
            ("ok", migrations)
        }
        Err(e) => {
            // driver errors stay in logs
            warn!(error = %e, "health check query failed");
            ("error", "unknown".to_string())
        }
    };

    let body = HealthResponse {
        status: if db == "ok" { "ok" } else { "degraded" },
        app_version: env!("CARGO_PKG_VERSION"),
        db,
        migrations,
        live_sessions: state.sessions.registry().len(),
        time,
    };
    let mut resp = if db == "ok" {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };
    Ok(resp.json(body))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health));
}
