use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, QueryOrder,
    Set,
};
use time::OffsetDateTime;

use crate::domain::{ParticipantStatus, SeatState};
use crate::entities::participants;
use crate::errors::domain::DomainError;

pub async fn insert<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
    seat: &SeatState,
) -> Result<participants::Model, DomainError> {
    let row = participants::ActiveModel {
        id: NotSet,
        session_id: Set(session_id),
        user_id: Set(seat.user_id),
        seat: Set(i16::from(seat.seat)),
        score: Set(seat.score as i32),
        score_turn: Set(seat.score_turn.map(|t| t as i32)),
        lifelines: Set(i16::from(seat.lifelines)),
        status: Set(seat.status.as_str().to_string()),
        is_synthetic: Set(seat.synthetic),
        disconnected_at: Set(None),
        created_at: Set(OffsetDateTime::now_utc()),
    };
    Ok(row.insert(conn).await?)
}

/// Participants in seat order.
pub async fn list<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
) -> Result<Vec<participants::Model>, DomainError> {
    Ok(participants::Entity::find()
        .filter(participants::Column::SessionId.eq(session_id))
        .order_by_asc(participants::Column::Seat)
        .all(conn)
        .await?)
}

/// Write back score, lifelines and status for one seat.
pub async fn update_seat<C: ConnectionTrait + Send + Sync>(
    conn: &C,
    session_id: i64,
    seat: &SeatState,
    disconnected_at: Option<OffsetDateTime>,
) -> Result<(), DomainError> {
    participants::Entity::update_many()
        .col_expr(participants::Column::Score, Expr::value(seat.score as i32))
        .col_expr(
            participants::Column::ScoreTurn,
            Expr::value(seat.score_turn.map(|t| t as i32)),
        )
        .col_expr(
            participants::Column::Lifelines,
            Expr::value(i16::from(seat.lifelines)),
        )
        .col_expr(participants::Column::Status, Expr::value(seat.status.as_str()))
        .col_expr(participants::Column::DisconnectedAt, Expr::value(disconnected_at))
        .filter(participants::Column::SessionId.eq(session_id))
        .filter(participants::Column::UserId.eq(seat.user_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Rebuild in-memory seat state from persisted rows.
pub fn to_seat(model: &participants::Model) -> Result<SeatState, DomainError> {
    let status: ParticipantStatus = model.status.parse()?;
    Ok(SeatState {
        user_id: model.user_id,
        seat: u8::try_from(model.seat)
            .map_err(|_| DomainError::invariant(format!("seat {} out of range", model.seat)))?,
        score: u32::try_from(model.score).unwrap_or(0),
        score_turn: model.score_turn.and_then(|t| u32::try_from(t).ok()),
        lifelines: u8::try_from(model.lifelines).unwrap_or(0),
        status,
        synthetic: model.is_synthetic,
    })
}
