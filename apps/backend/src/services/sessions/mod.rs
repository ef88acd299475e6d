//! Session state machine.
//!
//! Every transition for a session runs under that session's mutex, so two
//! actions on one session never interleave while different sessions proceed
//! in parallel. State is persisted before the in-memory copy is replaced;
//! events go out only after the write succeeded.

mod bots;
mod lifecycle;
mod presence;
pub mod registry;
mod settlement;
mod turns;

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use time::OffsetDateTime;

use crate::config::arena::ArenaConfig;
use crate::domain::{GameState, PoolKey, SeatState, SessionStatus};
use crate::errors::domain::{BusinessKind, DomainError, NotFoundKind};
use crate::events::{ArenaEvent, EventSink};
use crate::repos;
use crate::services::timers::TimerSlots;

pub use presence::GraceExpiry;
pub use registry::{LiveSession, SessionRegistry, SessionTimer, SharedSession};
pub use settlement::{Settlement, SweepReport};

/// A session as handed over by matchmaking: persisted in WAITING with fees
/// collected, seats in pool order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormedSession {
    pub session_id: i64,
    pub key: PoolKey,
    pub prize_pool: i64,
    pub rng_seed: i64,
    pub seats: Vec<SeatState>,
}

/// Read-only copy of a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub status: SessionStatus,
    pub game: GameState,
}

pub struct SessionManager {
    db: DatabaseConnection,
    config: Arc<ArenaConfig>,
    events: Arc<dyn EventSink>,
    registry: SessionRegistry,
    timers: TimerSlots<SessionTimer>,
}

impl SessionManager {
    pub fn new(
        db: DatabaseConnection,
        config: Arc<ArenaConfig>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            db,
            config,
            events,
            registry: SessionRegistry::new(),
            timers: TimerSlots::new(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn is_timer_armed(&self, timer: SessionTimer) -> bool {
        self.timers.is_armed(&timer)
    }

    pub async fn view(&self, session_id: i64) -> Option<SessionView> {
        let shared = self.registry.get(session_id)?;
        let live = shared.lock().await;
        Some(SessionView {
            status: live.status,
            game: live.game.clone(),
        })
    }

    async fn live(&self, session_id: i64) -> Result<SharedSession, DomainError> {
        if let Some(shared) = self.registry.get(session_id) {
            return Ok(shared);
        }
        match repos::sessions::find(&self.db, session_id).await? {
            Some(_) => Err(DomainError::business(
                BusinessKind::SessionNotActive,
                format!("session {session_id} is not in play"),
            )),
            None => Err(DomainError::not_found(
                NotFoundKind::Session,
                format!("session {session_id} not found"),
            )),
        }
    }

    fn emit(&self, live: &LiveSession, event: ArenaEvent) {
        self.events.publish(&live.participants(), event);
    }
}

fn ensure_playing(live: &LiveSession) -> Result<(), DomainError> {
    if live.status != SessionStatus::Playing {
        return Err(DomainError::business(
            BusinessKind::SessionNotActive,
            format!("session {} is {}", live.id, live.status),
        ));
    }
    Ok(())
}

fn encode(game: &GameState) -> Result<String, DomainError> {
    serde_json::to_string(game)
        .map_err(|e| DomainError::invariant(format!("cannot encode session payload: {e}")))
}

fn current_seat(game: &GameState) -> Option<i16> {
    let user = game.current_user()?;
    game.seat(user).map(|s| i16::from(s.seat))
}

/// Participant rows to write back for `users`.
fn seat_rows(
    live: &LiveSession,
    next: &GameState,
    users: &[i64],
) -> Vec<(SeatState, Option<OffsetDateTime>)> {
    next.seats
        .iter()
        .filter(|s| users.contains(&s.user_id))
        .map(|s| (s.clone(), live.disconnected_at.get(&s.user_id).copied()))
        .collect()
}
