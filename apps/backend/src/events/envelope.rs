use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::{Outcome, PoolKey, TerminationReason};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArenaEvent {
    Queued {
        pool: PoolKey,
        waiting: usize,
    },
    QueueLeft {
        pool: PoolKey,
    },
    /// Entry removed because the fee could not be collected at formation
    QueueDropped {
        pool: PoolKey,
        reason: String,
    },
    QueueExpired {
        pool: PoolKey,
    },
    SessionFormed {
        session_id: i64,
        pool: PoolKey,
        participants: Vec<i64>,
        prize_pool: i64,
    },
    SessionStarted {
        session_id: i64,
        board_size: usize,
        lifelines: u8,
    },
    TurnChanged {
        session_id: i64,
        user_id: i64,
        turn_no: u32,
    },
    CardRevealed {
        session_id: i64,
        user_id: i64,
        position: usize,
        face: u8,
    },
    ActionResolved {
        session_id: i64,
        user_id: i64,
        matched: bool,
        score: u32,
    },
    LifelineLost {
        session_id: i64,
        user_id: i64,
        lifelines_left: u8,
    },
    ParticipantEliminated {
        session_id: i64,
        user_id: i64,
    },
    ParticipantDisconnected {
        session_id: i64,
        user_id: i64,
    },
    ParticipantReconnected {
        session_id: i64,
        user_id: i64,
    },
    ParticipantQuit {
        session_id: i64,
        user_id: i64,
    },
    SessionEnded {
        session_id: i64,
        reason: TerminationReason,
        winner: Option<i64>,
    },
    SessionSettled {
        session_id: i64,
        outcome: Outcome,
    },
    SessionFrozen {
        session_id: i64,
    },
}

impl ArenaEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ArenaEvent::Queued { .. } => "queued",
            ArenaEvent::QueueLeft { .. } => "queue_left",
            ArenaEvent::QueueDropped { .. } => "queue_dropped",
            ArenaEvent::QueueExpired { .. } => "queue_expired",
            ArenaEvent::SessionFormed { .. } => "session_formed",
            ArenaEvent::SessionStarted { .. } => "session_started",
            ArenaEvent::TurnChanged { .. } => "turn_changed",
            ArenaEvent::CardRevealed { .. } => "card_revealed",
            ArenaEvent::ActionResolved { .. } => "action_resolved",
            ArenaEvent::LifelineLost { .. } => "lifeline_lost",
            ArenaEvent::ParticipantEliminated { .. } => "participant_eliminated",
            ArenaEvent::ParticipantDisconnected { .. } => "participant_disconnected",
            ArenaEvent::ParticipantReconnected { .. } => "participant_reconnected",
            ArenaEvent::ParticipantQuit { .. } => "participant_quit",
            ArenaEvent::SessionEnded { .. } => "session_ended",
            ArenaEvent::SessionSettled { .. } => "session_settled",
            ArenaEvent::SessionFrozen { .. } => "session_frozen",
        }
    }
}

/// What a subscriber receives.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
    #[serde(flatten)]
    pub event: ArenaEvent,
}

impl Envelope {
    pub fn now(event: ArenaEvent) -> Self {
        Self {
            at: OffsetDateTime::now_utc(),
            event,
        }
    }
}
