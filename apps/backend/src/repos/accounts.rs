//! Account rows. Balances change only through [`apply_delta`], which the
//! ledger calls alongside the entry it writes.

use sea_orm::sea_query::{Expr, OnConflict, Query};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use time::OffsetDateTime;

use crate::domain::{Balance, SessionStatus};
use crate::entities::{accounts, participants, sessions, waiting_entries};
use crate::errors::domain::{BusinessKind, DomainError, NotFoundKind};

pub async fn find<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
) -> Result<Option<accounts::Model>, DomainError> {
    Ok(accounts::Entity::find_by_id(account_id).one(conn).await?)
}

pub async fn require<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
) -> Result<accounts::Model, DomainError> {
    find(conn, account_id).await?.ok_or_else(|| {
        DomainError::not_found(NotFoundKind::Account, format!("account {account_id} not found"))
    })
}

pub async fn balance<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
) -> Result<Balance, DomainError> {
    let acc = require(conn, account_id).await?;
    Ok(Balance {
        playable: acc.playable,
        withdrawable: acc.withdrawable,
    })
}

/// Insert a zero-balance account unless one already exists.
pub async fn create_if_absent<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
    is_synthetic: bool,
) -> Result<accounts::Model, DomainError> {
    let now = OffsetDateTime::now_utc();
    let row = accounts::ActiveModel {
        id: Set(account_id),
        playable: Set(0),
        withdrawable: Set(0),
        is_synthetic: Set(is_synthetic),
        created_at: Set(now),
        updated_at: Set(now),
    };
    accounts::Entity::insert(row)
        .on_conflict(
            OnConflict::column(accounts::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    require(conn, account_id).await
}

/// Add signed deltas to both sub-balances.
///
/// The update only matches while both results stay non-negative, so a stale
/// read upstream can never drive a balance below zero.
pub async fn apply_delta<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    account_id: i64,
    playable_delta: i64,
    withdrawable_delta: i64,
) -> Result<Balance, DomainError> {
    let result = accounts::Entity::update_many()
        .col_expr(
            accounts::Column::Playable,
            Expr::col(accounts::Column::Playable).add(playable_delta),
        )
        .col_expr(
            accounts::Column::Withdrawable,
            Expr::col(accounts::Column::Withdrawable).add(withdrawable_delta),
        )
        .col_expr(
            accounts::Column::UpdatedAt,
            Expr::value(OffsetDateTime::now_utc()),
        )
        .filter(accounts::Column::Id.eq(account_id))
        .filter(Expr::expr(Expr::col(accounts::Column::Playable).add(playable_delta)).gte(0))
        .filter(
            Expr::expr(Expr::col(accounts::Column::Withdrawable).add(withdrawable_delta)).gte(0),
        )
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        // distinguish a missing account from a refused debit
        require(conn, account_id).await?;
        return Err(DomainError::business(
            BusinessKind::InsufficientFunds,
            format!("account {account_id} cannot absorb ({playable_delta}, {withdrawable_delta})"),
        ));
    }
    balance(conn, account_id).await
}

/// Synthetic accounts that are neither queued nor seated in an open session.
pub async fn find_idle_synthetic<C: ConnectionTrait + Send + Sync>(
    conn: &C,
) -> Result<Option<accounts::Model>, DomainError> {
    let queued = Query::select()
        .column(waiting_entries::Column::UserId)
        .from(waiting_entries::Entity)
        .to_owned();
    let seated = Query::select()
        .column((participants::Entity, participants::Column::UserId))
        .from(participants::Entity)
        .inner_join(
            sessions::Entity,
            Expr::col((sessions::Entity, sessions::Column::Id))
                .equals((participants::Entity, participants::Column::SessionId)),
        )
        .and_where(
            Expr::col((sessions::Entity, sessions::Column::Status))
                .is_in(SessionStatus::OCCUPYING.map(SessionStatus::as_str)),
        )
        .to_owned();

    Ok(accounts::Entity::find()
        .filter(accounts::Column::IsSynthetic.eq(true))
        .filter(accounts::Column::Id.not_in_subquery(queued))
        .filter(accounts::Column::Id.not_in_subquery(seated))
        .order_by_asc(accounts::Column::Id)
        .limit(1)
        .one(conn)
        .await?)
}

pub async fn max_synthetic_id<C: ConnectionTrait + Send + Sync>(
    conn: &C,
) -> Result<Option<i64>, DomainError> {
    Ok(accounts::Entity::find()
        .filter(accounts::Column::IsSynthetic.eq(true))
        .order_by_desc(accounts::Column::Id)
        .one(conn)
        .await?
        .map(|a| a.id))
}
