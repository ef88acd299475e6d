//! Periodic background loops: matching, queue TTL purge, settlement sweep.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::state::app_state::AppState;

/// Resume persisted sessions, then start the periodic loops. The loops stop
/// when `cancel` fires.
pub async fn spawn_workers(state: &AppState, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
    match state.sessions.recover().await {
        Ok(n) => info!(sessions = n, "sessions recovered"),
        Err(e) => error!(error = %e, "session recovery failed"),
    }

    let config = &state.config;
    let matching_every = config.matching_interval;
    let sweep_every = config.settlement_sweep_interval;
    // no point checking more often than a tenth of the TTL
    let purge_every = (config.queue_ttl / 10).max(Duration::from_secs(1));

    let coordinator = state.coordinator.clone();
    let matching = spawn_loop("matching", matching_every, cancel.clone(), move || {
        let coordinator = coordinator.clone();
        async move {
            if let Err(e) = coordinator.run_matching_pass().await {
                warn!(error = %e, "matching pass failed");
            }
        }
    });

    let coordinator = state.coordinator.clone();
    let purge = spawn_loop("queue_purge", purge_every, cancel.clone(), move || {
        let coordinator = coordinator.clone();
        async move {
            if let Err(e) = coordinator.purge_expired().await {
                warn!(error = %e, "queue purge failed");
            }
        }
    });

    let sessions = state.sessions.clone();
    let sweep = spawn_loop("settlement_sweep", sweep_every, cancel, move || {
        let sessions = sessions.clone();
        async move {
            if let Err(e) = sessions.sweep_pending().await {
                warn!(error = %e, "settlement sweep failed");
            }
        }
    });

    vec![matching, purge, sweep]
}

fn spawn_loop<F, Fut>(
    name: &'static str,
    every: Duration,
    cancel: CancellationToken,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => tick().await,
            }
        }
        info!(worker = name, "worker stopped");
    })
}
