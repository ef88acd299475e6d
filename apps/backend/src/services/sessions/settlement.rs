//! Pays out or refunds a terminated session exactly once.
//!
//! The ledger credits, the settlement record and the final status are
//! written in one transaction. A session that already has a record reports
//! `AlreadySettled` and changes nothing.

use std::sync::Arc;

use sea_orm::ConnectionTrait;
use tracing::{debug, error, info, warn};

use super::SessionManager;
use crate::db::txn::with_retrying_txn;
use crate::domain::{EntryKind, Outcome, SessionStatus, TerminationReason};
use crate::errors::domain::{BusinessKind, ConflictKind, DomainError, InfraErrorKind};
use crate::events::ArenaEvent;
use crate::repos;
use crate::services::ledger::ops;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Settled(Outcome),
    AlreadySettled(Outcome),
}

impl Settlement {
    pub fn outcome(&self) -> Outcome {
        match *self {
            Settlement::Settled(o) | Settlement::AlreadySettled(o) => o,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub settled: usize,
    pub deferred: usize,
    pub frozen: usize,
}

impl SessionManager {
    pub async fn settle(self: &Arc<Self>, session_id: i64) -> Result<Settlement, DomainError> {
        let result = with_retrying_txn(&self.db, &self.config.retry, "sessions.settle", move |txn| {
            Box::pin(settle_in(txn, session_id))
        })
        .await;

        match result {
            Ok(Settlement::Settled(outcome)) => {
                info!(session_id, outcome = outcome.as_str(), "session settled");
                let recipients: Vec<i64> = repos::participants::list(&self.db, session_id)
                    .await?
                    .iter()
                    .map(|p| p.user_id)
                    .collect();
                self.events
                    .publish(&recipients, ArenaEvent::SessionSettled { session_id, outcome });
                self.retire(session_id);
                Ok(Settlement::Settled(outcome))
            }
            Ok(already) => {
                debug!(session_id, "settlement already recorded");
                self.retire(session_id);
                Ok(already)
            }
            Err(DomainError::Invariant(detail)) => {
                error!(session_id, detail = %detail, "settlement invariant broken, freezing session");
                self.freeze(session_id).await;
                Err(DomainError::Invariant(detail))
            }
            Err(e) => Err(e),
        }
    }

    /// Settle after the session lock has been released. Failures leave the
    /// session in SETTLEMENT_PENDING for the sweep to pick up.
    pub(super) async fn finish_session(self: &Arc<Self>, session_id: i64) {
        if let Err(e) = self.settle(session_id).await {
            warn!(session_id, error = %e, "settlement deferred");
        }
    }

    /// Retry every session stuck in SETTLEMENT_PENDING.
    pub async fn sweep_pending(self: &Arc<Self>) -> Result<SweepReport, DomainError> {
        let mut report = SweepReport::default();
        for row in repos::sessions::list_by_status(&self.db, SessionStatus::SettlementPending).await? {
            match self.settle(row.id).await {
                Ok(_) => report.settled += 1,
                Err(DomainError::Invariant(_)) => report.frozen += 1,
                Err(_) => report.deferred += 1,
            }
        }
        if report != SweepReport::default() {
            info!(
                settled = report.settled,
                deferred = report.deferred,
                frozen = report.frozen,
                "settlement sweep"
            );
        }
        Ok(report)
    }

    /// Park a session for manual reconciliation.
    pub(super) async fn freeze(&self, session_id: i64) {
        let frozen = with_retrying_txn(&self.db, &self.config.retry, "sessions.freeze", move |txn| {
            Box::pin(async move { repos::sessions::mark_frozen(txn, session_id).await })
        })
        .await;
        match frozen {
            Ok(true) => {
                error!(session_id, "session frozen");
                let recipients = match self.registry.get(session_id) {
                    Some(shared) => shared.lock().await.participants(),
                    None => repos::participants::list(&self.db, session_id)
                        .await
                        .map(|rows| rows.iter().map(|p| p.user_id).collect())
                        .unwrap_or_default(),
                };
                self.events
                    .publish(&recipients, ArenaEvent::SessionFrozen { session_id });
            }
            Ok(false) => debug!(session_id, "session already terminal, not frozen"),
            Err(e) => error!(session_id, error = %e, "failed to freeze session"),
        }
        self.retire(session_id);
    }

    fn retire(&self, session_id: i64) {
        self.timers.cancel_where(|t| t.session_id() == session_id);
        self.registry.remove(session_id);
    }
}

async fn settle_in<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
) -> Result<Settlement, DomainError> {
    let row = repos::sessions::require(conn, session_id).await?;
    let reason = row
        .termination_reason
        .as_deref()
        .map(str::parse::<TerminationReason>)
        .transpose()?;

    if repos::settlements::find(conn, session_id).await?.is_some() {
        let reason = reason.ok_or_else(|| {
            DomainError::invariant(format!("settled session {session_id} has no reason"))
        })?;
        return Ok(Settlement::AlreadySettled(reason.outcome(row.winner_id)?));
    }

    match repos::sessions::status_of(&row)? {
        SessionStatus::SettlementPending => {}
        SessionStatus::Finished | SessionStatus::Cancelled => {
            return Err(DomainError::invariant(format!(
                "session {session_id} is terminal without a settlement record"
            )))
        }
        other => {
            return Err(DomainError::business(
                BusinessKind::SessionNotActive,
                format!("session {session_id} is {other}, nothing to settle"),
            ))
        }
    }

    let reason = reason.ok_or_else(|| {
        DomainError::invariant(format!("session {session_id} ended without a reason"))
    })?;
    let outcome = reason.outcome(row.winner_id)?;
    let participants = repos::participants::list(conn, session_id).await?;

    match outcome {
        Outcome::Winner(user_id) => {
            if !participants.iter().any(|p| p.user_id == user_id) {
                return Err(DomainError::invariant(format!(
                    "winner {user_id} is not seated in session {session_id}"
                )));
            }
            if row.prize_pool > 0 {
                ops::credit(conn, user_id, row.prize_pool, EntryKind::Winning, session_id).await?;
            }
        }
        Outcome::RefundAll => {
            let fees =
                repos::ledger_entries::list_for_session(conn, session_id, EntryKind::EntryFee)
                    .await?;
            for fee in fees {
                ops::credit(conn, fee.account_id, fee.amount, EntryKind::Refund, session_id)
                    .await?;
            }
        }
    }

    repos::settlements::insert(conn, session_id, outcome)
        .await
        .map_err(|e| match e {
            // a concurrent settle got there first; the retry will see its record
            DomainError::Conflict(ConflictKind::DuplicateKey, detail) => {
                DomainError::infra(InfraErrorKind::SerializationFailure, detail)
            }
            other => other,
        })?;

    let to = match outcome {
        Outcome::Winner(_) => SessionStatus::Finished,
        Outcome::RefundAll => SessionStatus::Cancelled,
    };
    if !repos::sessions::mark_settled(conn, session_id, to).await? {
        return Err(DomainError::invariant(format!(
            "session {session_id} left SETTLEMENT_PENDING during settlement"
        )));
    }
    Ok(Settlement::Settled(outcome))
}
