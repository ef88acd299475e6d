use std::sync::Arc;

use rand::Rng;
use sea_orm::DatabaseTransaction;
use tracing::{error, info, warn};

use super::Coordinator;
use crate::db::txn::{begin, finish, with_retrying_txn};
use crate::domain::{prize_pool, EntryKind, PoolKey, SeatState};
use crate::entities::waiting_entries;
use crate::errors::domain::{BusinessKind, DomainError};
use crate::events::ArenaEvent;
use crate::repos;
use crate::repos::sessions::NewSession;
use crate::services::ledger::ops;
use crate::services::sessions::FormedSession;

/// Stale batches tolerated in one pass before giving up on the key.
const MAX_STALE_BATCHES: usize = 3;

enum FormStep {
    Formed(FormedSession),
    /// Some entries were consumed elsewhere; nothing was written
    Stale,
    /// One participant could not be admitted; nothing was written
    Rejected { user_id: i64, error: DomainError },
}

impl Coordinator {
    /// Form sessions from the oldest entries of `key` while a full group is
    /// waiting, then hand each one to the session manager.
    pub async fn match_pool(self: &Arc<Self>, key: &PoolKey) -> Result<Vec<i64>, DomainError> {
        let party = usize::from(key.party_size);
        let mut formed = Vec::new();
        {
            let lock = self.pool_lock(key);
            let _pool = lock.lock().await;
            let mut stale = 0;

            loop {
                let entries = repos::waiting::list_pool(&self.db, key).await?;
                if entries.len() < party {
                    break;
                }
                let batch: Vec<waiting_entries::Model> = entries.into_iter().take(party).collect();

                match self.form_batch(key, &batch).await? {
                    FormStep::Formed(session) => {
                        info!(
                            session_id = session.session_id,
                            pool = %key,
                            prize_pool = session.prize_pool,
                            "session formed"
                        );
                        let users: Vec<i64> = session.seats.iter().map(|s| s.user_id).collect();
                        self.events.publish(
                            &users,
                            ArenaEvent::SessionFormed {
                                session_id: session.session_id,
                                pool: key.clone(),
                                participants: users.clone(),
                                prize_pool: session.prize_pool,
                            },
                        );
                        formed.push(session);
                    }
                    FormStep::Stale => {
                        stale += 1;
                        warn!(pool = %key, stale, "batch consumed concurrently, retrying");
                        if stale >= MAX_STALE_BATCHES {
                            break;
                        }
                    }
                    FormStep::Rejected { user_id, error } => {
                        self.drop_entry(key, user_id, &error).await?;
                    }
                }
            }

            if !formed.is_empty() {
                self.backfill.cancel(key);
                let rest = repos::waiting::list_pool(&self.db, key).await?;
                if rest.iter().any(|e| !e.is_synthetic) {
                    self.arm_backfill(key);
                }
            }
        }

        let mut ids = Vec::with_capacity(formed.len());
        for session in formed {
            let session_id = session.session_id;
            ids.push(session_id);
            if let Err(e) = self.sessions.start(session).await {
                error!(session_id, error = %e, "hand-off failed, session left waiting");
            }
        }
        Ok(ids)
    }

    async fn form_batch(
        &self,
        key: &PoolKey,
        batch: &[waiting_entries::Model],
    ) -> Result<FormStep, DomainError> {
        let prize = prize_pool(key.party_size, key.entry_fee, self.config.platform_cut_bps);
        let rng_seed: i64 = rand::rng().random();
        let lifelines = self.config.lifelines;

        self.config
            .retry
            .run("matchmaking.form", |_| async move {
                let txn = begin(&self.db).await?;
                match form_in(&txn, key, batch, prize, rng_seed, lifelines).await {
                    Ok(FormStep::Formed(session)) => finish(txn, Ok(FormStep::Formed(session))).await,
                    Ok(other) => {
                        txn.rollback().await?;
                        Ok(other)
                    }
                    Err(e) => finish(txn, Err(e)).await,
                }
            })
            .await
    }

    /// Remove the entry of a participant the formation could not admit.
    async fn drop_entry(
        &self,
        key: &PoolKey,
        user_id: i64,
        cause: &DomainError,
    ) -> Result<(), DomainError> {
        with_retrying_txn(&self.db, &self.config.retry, "matchmaking.drop", move |txn| {
            Box::pin(async move { repos::waiting::delete_by_user(txn, user_id).await })
        })
        .await?;
        warn!(user_id, pool = %key, error = %cause, "entry dropped at formation");
        self.events.publish(
            &[user_id],
            ArenaEvent::QueueDropped {
                pool: key.clone(),
                reason: drop_reason(cause).to_string(),
            },
        );
        Ok(())
    }
}

/// Consume `batch`, create the session with its seats and collect every
/// entry fee, all inside `txn`.
async fn form_in(
    txn: &DatabaseTransaction,
    key: &PoolKey,
    batch: &[waiting_entries::Model],
    prize: i64,
    rng_seed: i64,
    lifelines: u8,
) -> Result<FormStep, DomainError> {
    let ids: Vec<i64> = batch.iter().map(|e| e.id).collect();
    if repos::waiting::delete_ids(txn, &ids).await? != ids.len() as u64 {
        return Ok(FormStep::Stale);
    }

    for entry in batch {
        if let Some(session_id) = repos::sessions::open_session_for_user(txn, entry.user_id).await? {
            return Ok(FormStep::Rejected {
                user_id: entry.user_id,
                error: DomainError::business(
                    BusinessKind::AlreadyInSession,
                    format!("user {} is playing in session {session_id}", entry.user_id),
                ),
            });
        }
    }

    let session = repos::sessions::insert(
        txn,
        NewSession {
            key: key.clone(),
            prize_pool: prize,
            rng_seed,
        },
    )
    .await?;

    let mut seats = Vec::with_capacity(batch.len());
    for (seat, entry) in batch.iter().enumerate() {
        let seat = u8::try_from(seat)
            .map_err(|_| DomainError::invariant(format!("seat {seat} out of range")))?;
        let state = SeatState::new(entry.user_id, seat, lifelines, entry.is_synthetic);
        repos::participants::insert(txn, session.id, &state).await?;
        seats.push(state);
    }

    if key.entry_fee > 0 {
        for entry in batch {
            let debited =
                ops::debit(txn, entry.user_id, key.entry_fee, EntryKind::EntryFee, session.id).await;
            match debited {
                Ok(_) => {}
                Err(error @ (DomainError::Business(..) | DomainError::NotFound(..))) => {
                    return Ok(FormStep::Rejected {
                        user_id: entry.user_id,
                        error,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    Ok(FormStep::Formed(FormedSession {
        session_id: session.id,
        key: key.clone(),
        prize_pool: prize,
        rng_seed,
        seats,
    }))
}

/// User-facing reason for a dropped entry.
fn drop_reason(cause: &DomainError) -> &'static str {
    match cause {
        DomainError::Business(BusinessKind::InsufficientFunds, _) => "insufficient_funds",
        DomainError::Business(BusinessKind::AlreadyInSession, _) => "already_in_session",
        DomainError::NotFound(..) => "account_missing",
        _ => "rejected",
    }
}
