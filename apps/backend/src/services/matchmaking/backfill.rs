//! Synthetic participants for pools that stay short.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::Coordinator;
use crate::db::txn::with_retrying_txn;
use crate::domain::PoolKey;
use crate::errors::domain::{BusinessKind, DomainError};
use crate::repos;

/// Attempts at claiming a standby account before giving up on this firing.
const CLAIM_ATTEMPTS: usize = 3;

impl Coordinator {
    /// Arm the backfill timer for `key` unless one is already running.
    pub(super) fn arm_backfill(self: &Arc<Self>, key: &PoolKey) {
        let this = Arc::clone(self);
        let k = key.clone();
        self.backfill
            .arm_if_idle(key.clone(), self.config.backfill_delay, move |generation| async move {
                this.on_backfill_timer(k, generation).await
            });
    }

    async fn on_backfill_timer(self: Arc<Self>, key: PoolKey, generation: u64) {
        if !self.backfill.take_if_current(&key, generation) {
            return;
        }
        if let Err(e) = self.run_backfill(&key).await {
            warn!(pool = %key, error = %e, "backfill failed");
        }
    }

    /// Queue one synthetic participant if `key` is short and at least one
    /// genuine participant is waiting, then run a matching pass.
    /// Returns the synthetic user that was queued.
    pub async fn run_backfill(self: &Arc<Self>, key: &PoolKey) -> Result<Option<i64>, DomainError> {
        let added = {
            let lock = self.pool_lock(key);
            let _pool = lock.lock().await;

            let entries = repos::waiting::list_pool(&self.db, key).await?;
            let party = usize::from(key.party_size);
            if entries.is_empty() || entries.len() >= party {
                debug!(pool = %key, waiting = entries.len(), "backfill not needed");
                None
            } else if entries.iter().all(|e| e.is_synthetic) {
                debug!(pool = %key, "no genuine participant waiting, skipping backfill");
                None
            } else {
                Some(self.enqueue_standby(key).await?)
            }
        };

        let Some(user_id) = added else {
            return Ok(None);
        };
        info!(pool = %key, user_id, "backfill participant queued");
        self.match_pool(key).await?;

        let rest = repos::waiting::list_pool(&self.db, key).await?;
        if rest.iter().any(|e| !e.is_synthetic) {
            self.arm_backfill(key);
        }
        Ok(Some(user_id))
    }

    async fn enqueue_standby(&self, key: &PoolKey) -> Result<i64, DomainError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let user_id = self.standby.acquire(key.entry_fee).await?;
            let k = key.clone();
            let queued =
                with_retrying_txn(&self.db, &self.config.retry, "matchmaking.backfill", move |txn| {
                    let k = k.clone();
                    Box::pin(async move { repos::waiting::insert(txn, user_id, &k, true).await })
                })
                .await;
            match queued {
                Ok(_) => return Ok(user_id),
                // claimed by another pool in the meantime
                Err(e) if e.is_business(BusinessKind::AlreadyQueued) && attempt < CLAIM_ATTEMPTS => {
                    debug!(pool = %key, user_id, attempt, "standby account taken, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
