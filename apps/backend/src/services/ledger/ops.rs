//! Ledger operations over any connection. Callers own the transaction; every
//! function here assumes it runs inside one.

use tracing::{debug, info};

use crate::domain::{Balance, EntryKind, EntryStatus};
use crate::entities::ledger_entries;
use crate::errors::domain::{
    BusinessKind, ConflictKind, DomainError, InfraErrorKind, NotFoundKind, ValidationKind,
};
use crate::repos::accounts;
use crate::repos::ledger_entries::{self as entries, NewEntry};

use super::Receipt;

fn ensure_positive(amount: i64) -> Result<(), DomainError> {
    if amount <= 0 {
        return Err(DomainError::validation(
            ValidationKind::InvalidAmount,
            format!("amount must be positive, got {amount}"),
        ));
    }
    Ok(())
}

/// At most one entry may exist per idempotency key.
fn single(
    mut found: Vec<ledger_entries::Model>,
    key: impl FnOnce() -> String,
) -> Result<Option<ledger_entries::Model>, DomainError> {
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        n => Err(DomainError::invariant(format!(
            "{n} ledger entries share key {}",
            key()
        ))),
    }
}

/// A unique-index hit means a concurrent writer got there first; the retry
/// will find its entry and report it as already applied.
fn raced(err: DomainError) -> DomainError {
    match err {
        DomainError::Conflict(ConflictKind::DuplicateKey, detail) => {
            DomainError::infra(InfraErrorKind::SerializationFailure, detail)
        }
        other => other,
    }
}

async fn write_entry<C: sea_orm::ConnectionTrait + Send + Sync>(
    conn: &C,
    entry: NewEntry,
) -> Result<Receipt, DomainError> {
    let (account_id, dp, dw) = (entry.account_id, entry.playable_delta, entry.withdrawable_delta);
    accounts::require(conn, account_id).await?;
    let row = entries::insert(conn, entry).await.map_err(raced)?;
    let balance = accounts::apply_delta(conn, account_id, dp, dw).await?;
    Ok(Receipt {
        entry_id: row.id,
        applied: true,
        balance,
    })
}

async fn already_applied<C: sea_orm::ConnectionTrait + Send + Sync>(
    conn: &C,
    entry: &ledger_entries::Model,
) -> Result<Receipt, DomainError> {
    debug!(entry_id = entry.id, kind = %entry.kind, "ledger key already applied");
    Ok(Receipt {
        entry_id: entry.id,
        applied: false,
        balance: accounts::balance(conn, entry.account_id).await?,
    })
}

pub async fn balance<C: sea_orm::ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
) -> Result<Balance, DomainError> {
    accounts::balance(conn, account_id).await
}

/// Take `amount` from playable first, then withdrawable, keyed by
/// (account, session, kind).
pub async fn debit<C: sea_orm::ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
    amount: i64,
    kind: EntryKind,
    session_id: i64,
) -> Result<Receipt, DomainError> {
    ensure_positive(amount)?;
    let existing = entries::find_by_session_key(conn, account_id, session_id, kind).await?;
    if let Some(prior) = single(existing, || format!("({account_id}, {session_id}, {kind})"))? {
        return already_applied(conn, &prior).await;
    }

    let current = accounts::balance(conn, account_id).await?;
    let Some((from_playable, from_withdrawable)) = current.split_debit(amount) else {
        return Err(DomainError::business(
            BusinessKind::InsufficientFunds,
            format!(
                "account {account_id} has {} but {amount} is required",
                current.total()
            ),
        ));
    };

    let receipt = write_entry(
        conn,
        NewEntry {
            account_id,
            session_id: Some(session_id),
            kind,
            amount,
            playable_delta: -from_playable,
            withdrawable_delta: -from_withdrawable,
            status: EntryStatus::Completed,
            external_ref: None,
        },
    )
    .await?;
    info!(account_id, session_id, amount, %kind, "debit applied");
    Ok(receipt)
}

/// Credit keyed by (account, session, kind). WINNING lands in withdrawable,
/// everything else in playable.
pub async fn credit<C: sea_orm::ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
    amount: i64,
    kind: EntryKind,
    session_id: i64,
) -> Result<Receipt, DomainError> {
    ensure_positive(amount)?;
    let existing = entries::find_by_session_key(conn, account_id, session_id, kind).await?;
    if let Some(prior) = single(existing, || format!("({account_id}, {session_id}, {kind})"))? {
        return already_applied(conn, &prior).await;
    }

    let (dp, dw) = if kind.credits_withdrawable() {
        (0, amount)
    } else {
        (amount, 0)
    };
    let receipt = write_entry(
        conn,
        NewEntry {
            account_id,
            session_id: Some(session_id),
            kind,
            amount,
            playable_delta: dp,
            withdrawable_delta: dw,
            status: EntryStatus::Completed,
            external_ref: None,
        },
    )
    .await?;
    info!(account_id, session_id, amount, %kind, "credit applied");
    Ok(receipt)
}

/// Credit keyed by (kind, external reference) instead of a session.
pub async fn credit_external<C: sea_orm::ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
    amount: i64,
    kind: EntryKind,
    external_ref: &str,
    to_withdrawable: bool,
) -> Result<Receipt, DomainError> {
    ensure_positive(amount)?;
    if external_ref.trim().is_empty() {
        return Err(DomainError::validation(
            ValidationKind::Other("ExternalRef".into()),
            "external reference is required",
        ));
    }
    let existing = entries::find_by_external(conn, kind, external_ref).await?;
    if let Some(prior) = single(existing, || format!("({kind}, {external_ref})"))? {
        if prior.account_id != account_id {
            return Err(DomainError::conflict(
                ConflictKind::DuplicateKey,
                format!("reference {external_ref} belongs to another account"),
            ));
        }
        return already_applied(conn, &prior).await;
    }

    let (dp, dw) = if to_withdrawable { (0, amount) } else { (amount, 0) };
    let receipt = write_entry(
        conn,
        NewEntry {
            account_id,
            session_id: None,
            kind,
            amount,
            playable_delta: dp,
            withdrawable_delta: dw,
            status: EntryStatus::Completed,
            external_ref: Some(external_ref.to_string()),
        },
    )
    .await?;
    info!(account_id, amount, %kind, external_ref, "external credit applied");
    Ok(receipt)
}

/// Debit withdrawable only and leave a PENDING entry under `payout_ref`.
pub async fn reserve_withdrawal<C: sea_orm::ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
    amount: i64,
    payout_ref: &str,
) -> Result<Receipt, DomainError> {
    ensure_positive(amount)?;
    let current = accounts::balance(conn, account_id).await?;
    if current.withdrawable < amount {
        return Err(DomainError::business(
            BusinessKind::InsufficientFunds,
            format!(
                "account {account_id} can withdraw {} but asked for {amount}",
                current.withdrawable
            ),
        ));
    }
    write_entry(
        conn,
        NewEntry {
            account_id,
            session_id: None,
            kind: EntryKind::Withdrawal,
            amount,
            playable_delta: 0,
            withdrawable_delta: -amount,
            status: EntryStatus::Pending,
            external_ref: Some(payout_ref.to_string()),
        },
    )
    .await
}

pub async fn find_withdrawal<C: sea_orm::ConnectionTrait + Send + Sync>(
    conn: &C,
    payout_ref: &str,
) -> Result<ledger_entries::Model, DomainError> {
    let found = entries::find_by_external(conn, EntryKind::Withdrawal, payout_ref).await?;
    single(found, || format!("(WITHDRAWAL, {payout_ref})"))?.ok_or_else(|| {
        DomainError::not_found(
            NotFoundKind::Withdrawal,
            format!("no withdrawal with reference {payout_ref}"),
        )
    })
}

/// Sub-balances must equal the sum of all entry deltas.
pub async fn reconcile<C: sea_orm::ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
) -> Result<Balance, DomainError> {
    let stored = accounts::balance(conn, account_id).await?;
    let derived = entries::list_for_account(conn, account_id)
        .await?
        .iter()
        .fold(Balance::default(), |acc, e| Balance {
            playable: acc.playable + e.playable_delta,
            withdrawable: acc.withdrawable + e.withdrawable_delta,
        });
    if stored != derived {
        return Err(DomainError::invariant(format!(
            "account {account_id} stores {stored:?} but its entries sum to {derived:?}"
        )));
    }
    Ok(stored)
}
