//! Balances and the append-only transaction log.
//!
//! Every mutating call runs in its own serializable transaction, retried
//! while the failure is transient. The free functions in [`ops`] take any
//! connection so matchmaking can debit entry fees inside its own formation
//! transaction.

pub mod gateway;
pub mod ops;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use crate::db::txn::with_retrying_txn;
use crate::domain::{Balance, EntryKind, EntryStatus};
use crate::entities::{accounts as account_rows, ledger_entries};
use crate::errors::domain::{ConflictKind, DomainError, InfraErrorKind};
use crate::infra::retry::RetryPolicy;
use crate::logging::pii::Redacted;
use crate::repos::{accounts, ledger_entries as entries};

pub use gateway::{GatewayError, LoggingGateway, PaymentGateway, PayoutRequest, RecordingGateway};

/// Result of a keyed ledger call. `applied` is false when the key had
/// already been applied and nothing changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub entry_id: i64,
    pub applied: bool,
    pub balance: Balance,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub payout_ref: String,
    pub receipt: Receipt,
}

#[derive(Clone)]
pub struct LedgerService {
    db: DatabaseConnection,
    retry: RetryPolicy,
    gateway: Arc<dyn PaymentGateway>,
}

impl LedgerService {
    pub fn new(db: DatabaseConnection, retry: RetryPolicy, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { db, retry, gateway }
    }

    /// Storage failures that survive the retry budget surface as
    /// `LedgerUnavailable`.
    fn unavailable(err: DomainError) -> DomainError {
        if err.is_transient() {
            DomainError::infra(InfraErrorKind::LedgerUnavailable, err.to_string())
        } else {
            err
        }
    }

    pub async fn open_account(
        &self,
        account_id: i64,
        is_synthetic: bool,
    ) -> Result<account_rows::Model, DomainError> {
        with_retrying_txn(&self.db, &self.retry, "ledger.open_account", move |txn| {
            Box::pin(async move { accounts::create_if_absent(txn, account_id, is_synthetic).await })
        })
        .await
        .map_err(Self::unavailable)
    }

    pub async fn balance(&self, account_id: i64) -> Result<Balance, DomainError> {
        self.retry
            .run("ledger.balance", |_| ops::balance(&self.db, account_id))
            .await
            .map_err(Self::unavailable)
    }

    pub async fn debit(
        &self,
        account_id: i64,
        amount: i64,
        kind: EntryKind,
        session_id: i64,
    ) -> Result<Receipt, DomainError> {
        with_retrying_txn(&self.db, &self.retry, "ledger.debit", move |txn| {
            Box::pin(async move { ops::debit(txn, account_id, amount, kind, session_id).await })
        })
        .await
        .map_err(Self::unavailable)
    }

    pub async fn credit(
        &self,
        account_id: i64,
        amount: i64,
        kind: EntryKind,
        session_id: i64,
    ) -> Result<Receipt, DomainError> {
        with_retrying_txn(&self.db, &self.retry, "ledger.credit", move |txn| {
            Box::pin(async move { ops::credit(txn, account_id, amount, kind, session_id).await })
        })
        .await
        .map_err(Self::unavailable)
    }

    /// Gateway-confirmed deposit, idempotent on the gateway's reference.
    pub async fn confirm_deposit(
        &self,
        account_id: i64,
        amount: i64,
        external_ref: &str,
    ) -> Result<Receipt, DomainError> {
        self.credit_external(account_id, amount, EntryKind::Deposit, external_ref, false)
            .await
    }

    pub async fn grant_bonus(
        &self,
        account_id: i64,
        amount: i64,
        grant_ref: &str,
    ) -> Result<Receipt, DomainError> {
        self.credit_external(account_id, amount, EntryKind::Bonus, grant_ref, false)
            .await
    }

    async fn credit_external(
        &self,
        account_id: i64,
        amount: i64,
        kind: EntryKind,
        external_ref: &str,
        to_withdrawable: bool,
    ) -> Result<Receipt, DomainError> {
        let external_ref = external_ref.to_string();
        with_retrying_txn(&self.db, &self.retry, "ledger.credit_external", move |txn| {
            let external_ref = external_ref.clone();
            Box::pin(async move {
                ops::credit_external(txn, account_id, amount, kind, &external_ref, to_withdrawable)
                    .await
            })
        })
        .await
        .map_err(Self::unavailable)
    }

    /// Debit withdrawable now and hand the payout to the gateway. A gateway
    /// that refuses outright triggers the refund immediately.
    pub async fn request_withdrawal(
        &self,
        account_id: i64,
        amount: i64,
        destination: &str,
    ) -> Result<Withdrawal, DomainError> {
        let payout_ref = format!("po_{}", ulid::Ulid::new());
        let reserve_ref = payout_ref.clone();
        let receipt = with_retrying_txn(&self.db, &self.retry, "ledger.request_withdrawal", move |txn| {
            let payout_ref = reserve_ref.clone();
            Box::pin(async move {
                ops::reserve_withdrawal(txn, account_id, amount, &payout_ref).await
            })
        })
        .await
        .map_err(Self::unavailable)?;

        info!(
            account_id,
            amount,
            payout_ref = %payout_ref,
            destination = %Redacted(destination),
            "withdrawal reserved"
        );

        let request = PayoutRequest {
            payout_ref: payout_ref.clone(),
            account_id,
            amount,
            destination: destination.to_string(),
        };
        if let Err(e) = self.gateway.submit(request) {
            warn!(payout_ref = %payout_ref, error = %e, "gateway refused payout, refunding");
            let refunded = self.fail_withdrawal(&payout_ref).await?;
            return Ok(Withdrawal {
                payout_ref,
                receipt: refunded,
            });
        }

        Ok(Withdrawal {
            payout_ref,
            receipt,
        })
    }

    /// Gateway confirmed the payout.
    pub async fn complete_withdrawal(&self, payout_ref: &str) -> Result<Receipt, DomainError> {
        let payout_ref = payout_ref.to_string();
        with_retrying_txn(&self.db, &self.retry, "ledger.complete_withdrawal", move |txn| {
            let payout_ref = payout_ref.clone();
            Box::pin(async move {
                let entry = ops::find_withdrawal(txn, &payout_ref).await?;
                let moved = entries::transition_status(
                    txn,
                    entry.id,
                    EntryStatus::Pending,
                    EntryStatus::Completed,
                )
                .await?;
                if !moved && entry.status != EntryStatus::Completed.as_str() {
                    return Err(DomainError::conflict(
                        ConflictKind::Other("WithdrawalFailed".into()),
                        format!("withdrawal {payout_ref} already failed"),
                    ));
                }
                Ok(Receipt {
                    entry_id: entry.id,
                    applied: moved,
                    balance: ops::balance(txn, entry.account_id).await?,
                })
            })
        })
        .await
        .map_err(Self::unavailable)
    }

    /// Gateway gave up on the payout: mark it FAILED and refund withdrawable,
    /// keyed by the payout reference.
    pub async fn fail_withdrawal(&self, payout_ref: &str) -> Result<Receipt, DomainError> {
        let payout_ref = payout_ref.to_string();
        with_retrying_txn(&self.db, &self.retry, "ledger.fail_withdrawal", move |txn| {
            let payout_ref = payout_ref.clone();
            Box::pin(async move {
                let entry = ops::find_withdrawal(txn, &payout_ref).await?;
                let moved = entries::transition_status(
                    txn,
                    entry.id,
                    EntryStatus::Pending,
                    EntryStatus::Failed,
                )
                .await?;
                if !moved && entry.status != EntryStatus::Failed.as_str() {
                    return Err(DomainError::conflict(
                        ConflictKind::Other("WithdrawalCompleted".into()),
                        format!("withdrawal {payout_ref} already completed"),
                    ));
                }
                ops::credit_external(
                    txn,
                    entry.account_id,
                    entry.amount,
                    EntryKind::Refund,
                    &payout_ref,
                    true,
                )
                .await
            })
        })
        .await
        .map_err(Self::unavailable)
    }

    pub async fn reconcile(&self, account_id: i64) -> Result<Balance, DomainError> {
        let out = self
            .retry
            .run("ledger.reconcile", |_| ops::reconcile(&self.db, account_id))
            .await;
        if let Err(DomainError::Invariant(detail)) = &out {
            error!(account_id, detail = %detail, "ledger reconciliation failed");
        }
        out.map_err(Self::unavailable)
    }

    pub async fn history(&self, account_id: i64) -> Result<Vec<ledger_entries::Model>, DomainError> {
        accounts::require(&self.db, account_id).await?;
        entries::list_for_account(&self.db, account_id).await
    }
}
