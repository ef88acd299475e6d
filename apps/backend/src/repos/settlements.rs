use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use time::OffsetDateTime;

use crate::domain::Outcome;
use crate::entities::settlement_records;
use crate::errors::domain::DomainError;

pub async fn find<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
) -> Result<Option<settlement_records::Model>, DomainError> {
    Ok(settlement_records::Entity::find_by_id(session_id)
        .one(conn)
        .await?)
}

/// Primary key on session id; a second insert fails with `DuplicateKey`.
pub async fn insert<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
    outcome: Outcome,
) -> Result<settlement_records::Model, DomainError> {
    let row = settlement_records::ActiveModel {
        session_id: Set(session_id),
        outcome: Set(outcome.as_str().to_string()),
        settled_at: Set(OffsetDateTime::now_utc()),
    };
    Ok(row.insert(conn).await?)
}
