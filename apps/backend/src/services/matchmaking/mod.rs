//! Matchmaking coordinator: the waiting pool, atomic session formation and
//! backfill.
//!
//! Everything that reads or rewrites one pool key runs under that key's
//! mutex, so formations for the same key never interleave. Different keys
//! proceed in parallel.

mod backfill;
mod formation;
pub mod standby;

use std::sync::Arc;

use dashmap::DashMap;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::arena::ArenaConfig;
use crate::db::txn::with_retrying_txn;
use crate::domain::PoolKey;
use crate::entities::waiting_entries;
use crate::errors::domain::{BusinessKind, DomainError};
use crate::events::{ArenaEvent, EventSink};
use crate::repos;
use crate::services::ledger::LedgerService;
use crate::services::sessions::SessionManager;
use crate::services::timers::TimerSlots;

pub use standby::{StandbyPool, STANDBY_BASE_ID};

pub struct Coordinator {
    db: DatabaseConnection,
    config: Arc<ArenaConfig>,
    sessions: Arc<SessionManager>,
    events: Arc<dyn EventSink>,
    pool_locks: DashMap<PoolKey, Arc<Mutex<()>>>,
    backfill: TimerSlots<PoolKey>,
    standby: StandbyPool,
}

/// What a join did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    /// Pool size right after the entry went in
    pub waiting: usize,
    /// Sessions the follow-up matching pass formed
    pub formed: Vec<i64>,
}

impl Coordinator {
    pub fn new(
        db: DatabaseConnection,
        config: Arc<ArenaConfig>,
        ledger: LedgerService,
        sessions: Arc<SessionManager>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let standby = StandbyPool::new(db.clone(), ledger, config.standby_topup);
        Self {
            db,
            config,
            sessions,
            events,
            pool_locks: DashMap::new(),
            backfill: TimerSlots::new(),
            standby,
        }
    }

    pub fn is_backfill_armed(&self, key: &PoolKey) -> bool {
        self.backfill.is_armed(key)
    }

    fn pool_lock(&self, key: &PoolKey) -> Arc<Mutex<()>> {
        Arc::clone(self.pool_locks.entry(key.clone()).or_default().value())
    }

    /// Queue `user_id` for `key`, then run a matching pass for it.
    pub async fn join(self: &Arc<Self>, user_id: i64, key: PoolKey) -> Result<Joined, DomainError> {
        let lock = self.pool_lock(&key);
        let waiting = {
            let _pool = lock.lock().await;
            let k = key.clone();
            with_retrying_txn(&self.db, &self.config.retry, "matchmaking.join", move |txn| {
                let k = k.clone();
                Box::pin(async move { admit(txn, user_id, &k).await })
            })
            .await?
        };

        info!(user_id, pool = %key, waiting, "joined pool");
        self.events.publish(
            &[user_id],
            ArenaEvent::Queued {
                pool: key.clone(),
                waiting,
            },
        );
        self.arm_backfill(&key);
        let formed = self.match_pool(&key).await?;
        Ok(Joined { waiting, formed })
    }

    /// Drop the user's waiting entry. Returns false if there was none.
    pub async fn leave(self: &Arc<Self>, user_id: i64) -> Result<bool, DomainError> {
        let Some(entry) = repos::waiting::find_by_user(&self.db, user_id).await? else {
            return Ok(false);
        };
        let Some(key) = self.remove_entry(&entry, "matchmaking.leave").await? else {
            debug!(user_id, "entry consumed before leave");
            return Ok(false);
        };
        info!(user_id, pool = %key, "left pool");
        self.events
            .publish(&[user_id], ArenaEvent::QueueLeft { pool: key });
        Ok(true)
    }

    /// Delete exactly `entry` under its pool key's lock, then clear the key's
    /// backfill if only synthetic entries remain. `None` when the entry was
    /// already gone (consumed by a formation, or replaced by a newer one).
    pub async fn remove_entry(
        self: &Arc<Self>,
        entry: &waiting_entries::Model,
        op_name: &'static str,
    ) -> Result<Option<PoolKey>, DomainError> {
        let key = repos::waiting::key_of(entry)?;
        let lock = self.pool_lock(&key);
        let _pool = lock.lock().await;

        let (id, k) = (entry.id, key.clone());
        let (removed, orphans) = with_retrying_txn(&self.db, &self.config.retry, op_name, move |txn| {
            let k = k.clone();
            Box::pin(async move {
                if repos::waiting::delete_ids(txn, &[id]).await? == 0 {
                    return Ok((false, None));
                }
                Ok((true, drop_orphans(txn, &k).await?))
            })
        })
        .await?;

        if !removed {
            return Ok(None);
        }
        if let Some(synthetic) = orphans {
            self.backfill.cancel(&key);
            if !synthetic.is_empty() {
                info!(pool = %key, removed = synthetic.len(), "removed orphaned backfill entries");
            }
        }
        Ok(Some(key))
    }

    /// Run a matching pass over every pool key with entries. Errors on one
    /// key do not stop the others.
    pub async fn run_matching_pass(self: &Arc<Self>) -> Result<Vec<i64>, DomainError> {
        let mut formed = Vec::new();
        for key in repos::waiting::pool_keys(&self.db).await? {
            match self.match_pool(&key).await {
                Ok(ids) => formed.extend(ids),
                Err(e) => warn!(pool = %key, error = %e, "matching pass failed"),
            }
        }
        Ok(formed)
    }

    /// Remove entries older than the queue TTL.
    pub async fn purge_expired(self: &Arc<Self>) -> Result<usize, DomainError> {
        let cutoff = OffsetDateTime::now_utc() - self.config.queue_ttl;
        let mut purged = 0;
        for entry in repos::waiting::created_before(&self.db, cutoff).await? {
            let Some(key) = self.remove_entry(&entry, "matchmaking.purge").await? else {
                continue;
            };
            purged += 1;
            if !entry.is_synthetic {
                info!(user_id = entry.user_id, pool = %key, "queue entry expired");
                self.events
                    .publish(&[entry.user_id], ArenaEvent::QueueExpired { pool: key });
            }
        }
        Ok(purged)
    }
}

/// Join checks and insert. Returns the pool size afterwards.
async fn admit<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    user_id: i64,
    key: &PoolKey,
) -> Result<usize, DomainError> {
    if repos::waiting::find_by_user(conn, user_id).await?.is_some() {
        return Err(DomainError::business(
            BusinessKind::AlreadyQueued,
            format!("user {user_id} is already queued"),
        ));
    }
    if let Some(session_id) = repos::sessions::open_session_for_user(conn, user_id).await? {
        return Err(DomainError::business(
            BusinessKind::AlreadyInSession,
            format!("user {user_id} is playing in session {session_id}"),
        ));
    }
    if key.entry_fee > 0 {
        let total = repos::accounts::find(conn, user_id)
            .await?
            .map(|a| a.playable + a.withdrawable)
            .unwrap_or(0);
        if total < key.entry_fee {
            return Err(DomainError::business(
                BusinessKind::InsufficientFunds,
                format!("user {user_id} has {total}, entry fee is {}", key.entry_fee),
            ));
        }
    }
    repos::waiting::insert(conn, user_id, key, false).await?;
    Ok(repos::waiting::list_pool(conn, key).await?.len())
}

/// With no genuine entry left for `key`, delete its synthetic entries.
/// `Some(removed users)` when that was the case, `None` otherwise.
async fn drop_orphans<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    key: &PoolKey,
) -> Result<Option<Vec<i64>>, DomainError> {
    let rest = repos::waiting::list_pool(conn, key).await?;
    if rest.iter().any(|e| !e.is_synthetic) {
        return Ok(None);
    }
    let ids: Vec<i64> = rest.iter().map(|e| e.id).collect();
    if !ids.is_empty() {
        repos::waiting::delete_ids(conn, &ids).await?;
    }
    Ok(Some(rest.into_iter().map(|e| e.user_id).collect()))
}
