use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::ai::{Decision, MoveDecisionProvider};
use crate::domain::{GameState, PoolKey, SessionStatus};

/// Timers a live session can have armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionTimer {
    Turn(i64),
    /// Mismatched pair stays face up until this fires
    Hold(i64),
    Grace { session_id: i64, user_id: i64 },
    Bot(i64),
}

impl SessionTimer {
    pub fn session_id(&self) -> i64 {
        match *self {
            SessionTimer::Turn(id) | SessionTimer::Hold(id) | SessionTimer::Bot(id) => id,
            SessionTimer::Grace { session_id, .. } => session_id,
        }
    }
}

/// In-memory state of a session in play. Only ever touched under its mutex.
pub struct LiveSession {
    pub id: i64,
    pub key: PoolKey,
    pub prize_pool: i64,
    pub rng_seed: i64,
    pub status: SessionStatus,
    pub game: GameState,
    pub disconnected_at: HashMap<i64, OffsetDateTime>,
    pub bots: HashMap<i64, Box<dyn MoveDecisionProvider>>,
    /// Reveal chosen when the bot timer was armed
    pub pending_bot: Option<(i64, Decision)>,
}

impl LiveSession {
    pub fn participants(&self) -> Vec<i64> {
        self.game.seats.iter().map(|s| s.user_id).collect()
    }

    pub fn is_bot(&self, user_id: i64) -> bool {
        self.bots.contains_key(&user_id)
    }

    pub fn current_bot(&self) -> Option<i64> {
        self.game.current_user().filter(|u| self.is_bot(*u))
    }
}

pub type SharedSession = Arc<Mutex<LiveSession>>;

/// Arena of live sessions keyed by id.
#[derive(Default)]
pub struct SessionRegistry {
    live: DashMap<i64, SharedSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: i64) -> Option<SharedSession> {
        self.live.get(&session_id).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, session_id: i64) -> bool {
        self.live.contains_key(&session_id)
    }

    /// Register `session` and return it already locked, so nobody observes
    /// it before the caller has persisted it. `None` if the id is taken.
    pub fn insert_locked(&self, session: LiveSession) -> Option<OwnedMutexGuard<LiveSession>> {
        let shared = Arc::new(Mutex::new(session));
        let guard = Arc::clone(&shared).try_lock_owned().ok()?;
        match self.live.entry(guard.id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(shared);
                Some(guard)
            }
        }
    }

    pub fn remove(&self, session_id: i64) -> Option<SharedSession> {
        self.live.remove(&session_id).map(|(_, s)| s)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
