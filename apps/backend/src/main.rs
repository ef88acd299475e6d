use std::str::FromStr;

use actix_web::{web, App, HttpServer};
use arena::config::server::ServerConfig;
use arena::health;
use arena::infra::state::build_state;
use arena::infra::workers::spawn_workers;
use db_infra::db::{DbKind, RuntimeEnv};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod telemetry;

fn env_or<T: FromStr<Err = db_infra::DbInfraError>>(name: &str, default: T) -> Result<T, String> {
    match std::env::var(name) {
        Ok(raw) => raw.parse::<T>().map_err(|e| format!("{name}: {e}")),
        Err(_) => Ok(default),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    telemetry::init_tracing();

    // Environment variables must be set by the runtime environment:
    // - Docker: Set via docker-compose env_file or docker run --env-file
    // - Local dev: Source env files manually (e.g., set -a; . ./.env; set +a)
    let (env, kind, server) = match (
        env_or("ARENA_ENV", RuntimeEnv::Prod),
        env_or("ARENA_DB_KIND", DbKind::Postgres),
        ServerConfig::from_env(),
    ) {
        (Ok(env), Ok(kind), Ok(server)) => (env, kind, server),
        (env, kind, server) => {
            let problems: Vec<String> = [env.err(), kind.err(), server.err().map(|e| e.to_string())]
                .into_iter()
                .flatten()
                .collect();
            error!(problems = ?problems, "invalid configuration");
            std::process::exit(1);
        }
    };

    let state = match build_state().with_env(env).with_db(kind).build().await {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "failed to build application state");
            std::process::exit(1);
        }
    };

    let cancel = CancellationToken::new();
    let workers = spawn_workers(&state, cancel.clone()).await;

    info!(host = %server.host, port = server.port, env = ?env, db_kind = ?kind, "arena listening");

    let data = web::Data::new(state);
    let served = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(health::configure)
    })
    .bind((server.host.as_str(), server.port))?
    .run()
    .await;

    cancel.cancel();
    for worker in workers {
        let _ = worker.await;
    }
    served
}
