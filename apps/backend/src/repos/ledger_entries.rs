//! Ledger entry rows. Entries are append-only apart from the status column.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, QueryOrder,
    Set,
};
use time::OffsetDateTime;

use crate::domain::{EntryKind, EntryStatus};
use crate::entities::ledger_entries;
use crate::errors::domain::DomainError;

#[derive(Debug, Clone)]
pub struct NewEntry {
    pub account_id: i64,
    pub session_id: Option<i64>,
    pub kind: EntryKind,
    pub amount: i64,
    pub playable_delta: i64,
    pub withdrawable_delta: i64,
    pub status: EntryStatus,
    pub external_ref: Option<String>,
}

pub async fn insert<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    entry: NewEntry,
) -> Result<ledger_entries::Model, DomainError> {
    let now = OffsetDateTime::now_utc();
    let row = ledger_entries::ActiveModel {
        id: NotSet,
        account_id: Set(entry.account_id),
        session_id: Set(entry.session_id),
        kind: Set(entry.kind.as_str().to_string()),
        amount: Set(entry.amount),
        playable_delta: Set(entry.playable_delta),
        withdrawable_delta: Set(entry.withdrawable_delta),
        status: Set(entry.status.as_str().to_string()),
        external_ref: Set(entry.external_ref),
        created_at: Set(now),
        updated_at: Set(now),
    };
    Ok(row.insert(conn).await?)
}

/// Entries under the (account, session, kind) idempotency key.
pub async fn find_by_session_key<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
    session_id: i64,
    kind: EntryKind,
) -> Result<Vec<ledger_entries::Model>, DomainError> {
    Ok(ledger_entries::Entity::find()
        .filter(ledger_entries::Column::AccountId.eq(account_id))
        .filter(ledger_entries::Column::SessionId.eq(session_id))
        .filter(ledger_entries::Column::Kind.eq(kind.as_str()))
        .all(conn)
        .await?)
}

/// Entries under the (kind, external reference) idempotency key.
pub async fn find_by_external<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    kind: EntryKind,
    external_ref: &str,
) -> Result<Vec<ledger_entries::Model>, DomainError> {
    Ok(ledger_entries::Entity::find()
        .filter(ledger_entries::Column::Kind.eq(kind.as_str()))
        .filter(ledger_entries::Column::ExternalRef.eq(external_ref))
        .all(conn)
        .await?)
}

/// Move an entry from `from` to `to`. Returns false if it was not in `from`.
pub async fn transition_status<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    entry_id: i64,
    from: EntryStatus,
    to: EntryStatus,
) -> Result<bool, DomainError> {
    let result = ledger_entries::Entity::update_many()
        .col_expr(ledger_entries::Column::Status, Expr::value(to.as_str()))
        .col_expr(
            ledger_entries::Column::UpdatedAt,
            Expr::value(OffsetDateTime::now_utc()),
        )
        .filter(ledger_entries::Column::Id.eq(entry_id))
        .filter(ledger_entries::Column::Status.eq(from.as_str()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

pub async fn list_for_account<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
) -> Result<Vec<ledger_entries::Model>, DomainError> {
    Ok(ledger_entries::Entity::find()
        .filter(ledger_entries::Column::AccountId.eq(account_id))
        .order_by_asc(ledger_entries::Column::Id)
        .all(conn)
        .await?)
}

pub async fn list_for_session<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
    kind: EntryKind,
) -> Result<Vec<ledger_entries::Model>, DomainError> {
    Ok(ledger_entries::Entity::find()
        .filter(ledger_entries::Column::SessionId.eq(session_id))
        .filter(ledger_entries::Column::Kind.eq(kind.as_str()))
        .order_by_asc(ledger_entries::Column::Id)
        .all(conn)
        .await?)
}
