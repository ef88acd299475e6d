//! The waiting pool. Pool order is insertion order (`id`).

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use time::OffsetDateTime;

use crate::domain::PoolKey;
use crate::entities::waiting_entries;
use crate::errors::domain::{BusinessKind, ConflictKind, DomainError};

/// Insert a waiting entry; the unique index on `user_id` turns a second
/// entry for the same user into `AlreadyQueued`.
pub async fn insert<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    user_id: i64,
    key: &PoolKey,
    is_synthetic: bool,
) -> Result<waiting_entries::Model, DomainError> {
    let row = waiting_entries::ActiveModel {
        id: NotSet,
        user_id: Set(user_id),
        game_kind: Set(key.game_kind.clone()),
        party_size: Set(i16::from(key.party_size)),
        entry_fee: Set(key.entry_fee),
        is_synthetic: Set(is_synthetic),
        created_at: Set(OffsetDateTime::now_utc()),
    };
    row.insert(conn).await.map_err(|e| match DomainError::from(e) {
        DomainError::Conflict(ConflictKind::DuplicateKey, _) => DomainError::business(
            BusinessKind::AlreadyQueued,
            format!("user {user_id} is already queued"),
        ),
        other => other,
    })
}

pub async fn find_by_user<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    user_id: i64,
) -> Result<Option<waiting_entries::Model>, DomainError> {
    Ok(waiting_entries::Entity::find()
        .filter(waiting_entries::Column::UserId.eq(user_id))
        .one(conn)
        .await?)
}

/// Entries for `key`, oldest first.
pub async fn list_pool<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    key: &PoolKey,
) -> Result<Vec<waiting_entries::Model>, DomainError> {
    Ok(waiting_entries::Entity::find()
        .filter(waiting_entries::Column::GameKind.eq(key.game_kind.as_str()))
        .filter(waiting_entries::Column::PartySize.eq(i16::from(key.party_size)))
        .filter(waiting_entries::Column::EntryFee.eq(key.entry_fee))
        .order_by_asc(waiting_entries::Column::Id)
        .all(conn)
        .await?)
}

/// Delete exactly the given entries. Returns how many rows went away, so a
/// caller can tell when a concurrent pass consumed some of them first.
pub async fn delete_ids<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    ids: &[i64],
) -> Result<u64, DomainError> {
    let result = waiting_entries::Entity::delete_many()
        .filter(waiting_entries::Column::Id.is_in(ids.iter().copied()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}

pub async fn delete_by_user<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    user_id: i64,
) -> Result<Option<waiting_entries::Model>, DomainError> {
    let Some(entry) = find_by_user(conn, user_id).await? else {
        return Ok(None);
    };
    waiting_entries::Entity::delete_by_id(entry.id)
        .exec(conn)
        .await?;
    Ok(Some(entry))
}

/// Distinct pool keys that currently have at least one entry.
pub async fn pool_keys<C: ConnectionTrait + Send + Sync>(
    conn: &C,
) -> Result<Vec<PoolKey>, DomainError> {
    let rows: Vec<(String, i16, i64)> = waiting_entries::Entity::find()
        .select_only()
        .column(waiting_entries::Column::GameKind)
        .column(waiting_entries::Column::PartySize)
        .column(waiting_entries::Column::EntryFee)
        .group_by(waiting_entries::Column::GameKind)
        .group_by(waiting_entries::Column::PartySize)
        .group_by(waiting_entries::Column::EntryFee)
        .into_tuple()
        .all(conn)
        .await?;
    rows.into_iter()
        .map(|(kind, party, fee)| {
            let party = u8::try_from(party)
                .map_err(|_| DomainError::invariant(format!("party size {party} out of range")))?;
            PoolKey::new(kind, party, fee)
        })
        .collect()
}

/// Entries created before `cutoff`.
pub async fn created_before<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    cutoff: OffsetDateTime,
) -> Result<Vec<waiting_entries::Model>, DomainError> {
    Ok(waiting_entries::Entity::find()
        .filter(waiting_entries::Column::CreatedAt.lt(cutoff))
        .order_by_asc(waiting_entries::Column::Id)
        .all(conn)
        .await?)
}

pub fn key_of(entry: &waiting_entries::Model) -> Result<PoolKey, DomainError> {
    let party = u8::try_from(entry.party_size).map_err(|_| {
        DomainError::invariant(format!("party size {} out of range", entry.party_size))
    })?;
    PoolKey::new(entry.game_kind.clone(), party, entry.entry_fee)
}
