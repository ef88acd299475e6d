//! Session rows with versioned, status-guarded updates.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, JoinType, NotSet, QueryFilter,
    QueryOrder, QuerySelect, RelationTrait, Set, UpdateMany,
};
use time::OffsetDateTime;

use crate::domain::{PoolKey, SessionStatus, TerminationReason};
use crate::entities::{participants, sessions};
use crate::errors::domain::{ConflictKind, DomainError, NotFoundKind};

#[derive(Debug, Clone)]
pub struct NewSession {
    pub key: PoolKey,
    pub prize_pool: i64,
    pub rng_seed: i64,
}

pub async fn insert<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    dto: NewSession,
) -> Result<sessions::Model, DomainError> {
    let row = sessions::ActiveModel {
        id: NotSet,
        game_kind: Set(dto.key.game_kind),
        party_size: Set(i16::from(dto.key.party_size)),
        entry_fee: Set(dto.key.entry_fee),
        prize_pool: Set(dto.prize_pool),
        status: Set(SessionStatus::Waiting.as_str().to_string()),
        termination_reason: Set(None),
        winner_id: Set(None),
        current_seat: Set(None),
        turn_no: Set(0),
        rng_seed: Set(dto.rng_seed),
        payload: Set(String::new()),
        version: Set(1),
        created_at: Set(OffsetDateTime::now_utc()),
        started_at: Set(None),
        finished_at: Set(None),
    };
    Ok(row.insert(conn).await?)
}

pub async fn find<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
) -> Result<Option<sessions::Model>, DomainError> {
    Ok(sessions::Entity::find_by_id(session_id).one(conn).await?)
}

pub async fn require<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
) -> Result<sessions::Model, DomainError> {
    find(conn, session_id).await?.ok_or_else(|| {
        DomainError::not_found(NotFoundKind::Session, format!("session {session_id} not found"))
    })
}

pub fn status_of(model: &sessions::Model) -> Result<SessionStatus, DomainError> {
    model.status.parse()
}

/// Apply `configure` only while the session is in one of `from`.
/// Bumps the version. Returns false if the status guard did not match.
async fn guarded_update<C, F>(
    conn: &C,
    session_id: i64,
    from: &[SessionStatus],
    configure: F,
) -> Result<bool, DomainError>
where
    C: ConnectionTrait + Send + Sync,
    F: FnOnce(UpdateMany<sessions::Entity>) -> UpdateMany<sessions::Entity>,
{
    let result = configure(sessions::Entity::update_many())
        .col_expr(
            sessions::Column::Version,
            Expr::col(sessions::Column::Version).add(1),
        )
        .filter(sessions::Column::Id.eq(session_id))
        .filter(sessions::Column::Status.is_in(from.iter().map(|s| s.as_str())))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

fn set_status(
    update: UpdateMany<sessions::Entity>,
    to: SessionStatus,
) -> UpdateMany<sessions::Entity> {
    update.col_expr(sessions::Column::Status, Expr::value(to.as_str()))
}

/// WAITING -> PLAYING with the initial board.
pub async fn mark_playing<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
    payload: &str,
    current_seat: Option<i16>,
    turn_no: i32,
) -> Result<bool, DomainError> {
    let payload = payload.to_string();
    guarded_update(conn, session_id, &[SessionStatus::Waiting], |u| {
        set_status(u, SessionStatus::Playing)
            .col_expr(sessions::Column::Payload, Expr::value(payload))
            .col_expr(sessions::Column::CurrentSeat, Expr::value(current_seat))
            .col_expr(sessions::Column::TurnNo, Expr::value(turn_no))
            .col_expr(
                sessions::Column::StartedAt,
                Expr::value(Some(OffsetDateTime::now_utc())),
            )
    })
    .await
}

/// Persist turn progress. Fails with `OptimisticLock` if the row moved on.
pub async fn save_progress<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
    payload: &str,
    current_seat: Option<i16>,
    turn_no: i32,
) -> Result<(), DomainError> {
    let payload = payload.to_string();
    let updated = guarded_update(conn, session_id, &[SessionStatus::Playing], |u| {
        u.col_expr(sessions::Column::Payload, Expr::value(payload))
            .col_expr(sessions::Column::CurrentSeat, Expr::value(current_seat))
            .col_expr(sessions::Column::TurnNo, Expr::value(turn_no))
    })
    .await?;
    if !updated {
        return Err(DomainError::conflict(
            ConflictKind::OptimisticLock,
            format!("session {session_id} is no longer playing"),
        ));
    }
    Ok(())
}

/// Record the outcome and enter SETTLEMENT_PENDING. Returns false when the
/// session had already left WAITING/PLAYING.
pub async fn mark_settlement_pending<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
    reason: TerminationReason,
    winner_id: Option<i64>,
    payload: Option<&str>,
) -> Result<bool, DomainError> {
    let payload = payload.map(str::to_string);
    guarded_update(
        conn,
        session_id,
        &[SessionStatus::Waiting, SessionStatus::Playing],
        |u| {
            let u = set_status(u, SessionStatus::SettlementPending)
                .col_expr(
                    sessions::Column::TerminationReason,
                    Expr::value(Some(reason.as_str().to_string())),
                )
                .col_expr(sessions::Column::WinnerId, Expr::value(winner_id))
                .col_expr(sessions::Column::CurrentSeat, Expr::value(None::<i16>));
            match payload {
                Some(p) => u.col_expr(sessions::Column::Payload, Expr::value(p)),
                None => u,
            }
        },
    )
    .await
}

/// SETTLEMENT_PENDING -> FINISHED | CANCELLED.
pub async fn mark_settled<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
    to: SessionStatus,
) -> Result<bool, DomainError> {
    guarded_update(conn, session_id, &[SessionStatus::SettlementPending], |u| {
        set_status(u, to).col_expr(
            sessions::Column::FinishedAt,
            Expr::value(Some(OffsetDateTime::now_utc())),
        )
    })
    .await
}

pub async fn mark_frozen<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
) -> Result<bool, DomainError> {
    guarded_update(
        conn,
        session_id,
        &[
            SessionStatus::Waiting,
            SessionStatus::Playing,
            SessionStatus::SettlementPending,
        ],
        |u| set_status(u, SessionStatus::Frozen),
    )
    .await
}

pub async fn list_by_status<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    status: SessionStatus,
) -> Result<Vec<sessions::Model>, DomainError> {
    Ok(sessions::Entity::find()
        .filter(sessions::Column::Status.eq(status.as_str()))
        .order_by_asc(sessions::Column::Id)
        .all(conn)
        .await?)
}

/// The session `user_id` is still held by (WAITING, PLAYING or awaiting
/// settlement), if any.
pub async fn open_session_for_user<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    user_id: i64,
) -> Result<Option<i64>, DomainError> {
    let found = sessions::Entity::find()
        .join(JoinType::InnerJoin, sessions::Relation::Participants.def())
        .filter(participants::Column::UserId.eq(user_id))
        .filter(
            sessions::Column::Status.is_in(SessionStatus::OCCUPYING.map(SessionStatus::as_str)),
        )
        .one(conn)
        .await?;
    Ok(found.map(|s| s.id))
}
