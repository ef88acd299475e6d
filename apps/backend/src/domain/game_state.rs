//! Turn state of one pair-matching session, free of I/O.
//!
//! A turn unit is two reveals. A matching pair scores and the same player goes
//! again; a mismatch locks the turn (`Resolving`) until the hold ends and play
//! passes to the next seat still in rotation.

use serde::{Deserialize, Serialize};

use super::board::{Board, CardState};
use super::status::ParticipantStatus;
use crate::errors::domain::{BusinessKind, DomainError, ValidationKind};

/// Reveals allowed per turn unit.
pub const REVEALS_PER_TURN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatState {
    pub user_id: i64,
    pub seat: u8,
    pub score: u32,
    /// Turn number at which the current score was reached
    pub score_turn: Option<u32>,
    pub lifelines: u8,
    pub status: ParticipantStatus,
    pub synthetic: bool,
}

impl SeatState {
    pub fn new(user_id: i64, seat: u8, lifelines: u8, synthetic: bool) -> Self {
        Self {
            user_id,
            seat,
            score: 0,
            score_turn: None,
            lifelines,
            status: ParticipantStatus::Active,
            synthetic,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    Awaiting,
    /// A mismatched pair is face up; the current participant gets `TurnLocked`
    Resolving,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// First reveal of the turn unit
    Pending,
    Matched { score: u32 },
    Mismatched,
    /// Last pair matched; the board is done
    BoardCleared { winner: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealOutcome {
    pub position: usize,
    pub face: u8,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutOutcome {
    pub user_id: i64,
    pub lifelines_left: u8,
    pub eliminated: bool,
    /// Set when only one participant remains in rotation
    pub sole_survivor: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub was_current: bool,
    pub sole_survivor: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub board: Board,
    pub seats: Vec<SeatState>,
    /// Index into `seats` of the participant whose turn it is
    pub current: usize,
    pub open: Vec<usize>,
    pub phase: TurnPhase,
    pub turn_no: u32,
}

impl GameState {
    pub fn new(board: Board, seats: Vec<SeatState>) -> Self {
        Self {
            board,
            seats,
            current: 0,
            open: Vec::with_capacity(REVEALS_PER_TURN),
            phase: TurnPhase::Awaiting,
            turn_no: 1,
        }
    }

    pub fn current_user(&self) -> Option<i64> {
        self.seats
            .get(self.current)
            .filter(|s| s.status.in_rotation())
            .map(|s| s.user_id)
    }

    pub fn seat(&self, user_id: i64) -> Option<&SeatState> {
        self.seats.iter().find(|s| s.user_id == user_id)
    }

    fn seat_index(&self, user_id: i64) -> Option<usize> {
        self.seats.iter().position(|s| s.user_id == user_id)
    }

    pub fn in_rotation(&self) -> impl Iterator<Item = &SeatState> {
        self.seats.iter().filter(|s| s.status.in_rotation())
    }

    pub fn sole_in_rotation(&self) -> Option<i64> {
        let mut it = self.in_rotation();
        match (it.next(), it.next()) {
            (Some(only), None) => Some(only.user_id),
            _ => None,
        }
    }

    /// Highest score wins; ties go to whoever reached it first, then seat order.
    pub fn leader(&self) -> Option<i64> {
        self.in_rotation()
            .min_by_key(|s| {
                (
                    std::cmp::Reverse(s.score),
                    s.score_turn.unwrap_or(u32::MAX),
                    s.seat,
                )
            })
            .map(|s| s.user_id)
    }

    pub fn reveal(&mut self, user_id: i64, position: usize) -> Result<RevealOutcome, DomainError> {
        let idx = self.seat_index(user_id).ok_or_else(|| {
            DomainError::business(
                BusinessKind::NotAParticipant,
                format!("user {user_id} is not seated"),
            )
        })?;
        if self.current_user() != Some(user_id) {
            return Err(DomainError::business(
                BusinessKind::NotYourTurn,
                format!("user {user_id} acted out of turn"),
            ));
        }
        if self.phase == TurnPhase::Resolving {
            return Err(DomainError::business(
                BusinessKind::TurnLocked,
                "previous pair is still resolving",
            ));
        }
        if !self.board.is_hidden(position) {
            return Err(DomainError::validation(
                ValidationKind::InvalidAction,
                format!("position {position} cannot be revealed"),
            ));
        }

        self.board.set_state(position, CardState::Revealed);
        self.open.push(position);
        let face = self.board.cards[position].face;

        if self.open.len() < REVEALS_PER_TURN {
            return Ok(RevealOutcome {
                position,
                face,
                resolution: Resolution::Pending,
            });
        }

        let first = self.open[0];
        let resolution = if self.board.cards[first].face == face {
            self.board.set_state(first, CardState::Matched { by: user_id });
            self.board.set_state(position, CardState::Matched { by: user_id });
            self.open.clear();
            let seat = &mut self.seats[idx];
            seat.score += 1;
            seat.score_turn = Some(self.turn_no);
            let score = seat.score;
            self.turn_no += 1;
            if self.board.all_matched() {
                let winner = self.leader().unwrap_or(user_id);
                Resolution::BoardCleared { winner }
            } else {
                Resolution::Matched { score }
            }
        } else {
            self.phase = TurnPhase::Resolving;
            Resolution::Mismatched
        };

        Ok(RevealOutcome {
            position,
            face,
            resolution,
        })
    }

    /// Turn the mismatched pair back over and pass the turn.
    pub fn end_resolution(&mut self) -> Option<i64> {
        if self.phase != TurnPhase::Resolving {
            return None;
        }
        self.hide_open();
        self.phase = TurnPhase::Awaiting;
        self.turn_no += 1;
        self.advance();
        self.current_user()
    }

    /// Turn timer fired before the turn unit completed. `None` while resolving.
    pub fn timeout(&mut self) -> Option<TimeoutOutcome> {
        if self.phase != TurnPhase::Awaiting {
            return None;
        }
        let user_id = self.current_user()?;
        self.hide_open();

        let seat = &mut self.seats[self.current];
        seat.lifelines = seat.lifelines.saturating_sub(1);
        let lifelines_left = seat.lifelines;
        let eliminated = lifelines_left == 0;
        if eliminated {
            seat.status = ParticipantStatus::Eliminated;
        }
        self.turn_no += 1;

        let sole_survivor = self.sole_in_rotation();
        if sole_survivor.is_none() {
            self.advance();
        }
        Some(TimeoutOutcome {
            user_id,
            lifelines_left,
            eliminated,
            sole_survivor,
        })
    }

    /// Take a participant out of rotation (quit or dropped after grace).
    pub fn remove(&mut self, user_id: i64, status: ParticipantStatus) -> Option<RemovalOutcome> {
        let idx = self.seat_index(user_id)?;
        if !self.seats[idx].status.in_rotation() {
            return None;
        }
        let was_current = idx == self.current;
        self.seats[idx].status = status;
        if was_current {
            self.hide_open();
            self.phase = TurnPhase::Awaiting;
            self.turn_no += 1;
        }
        let sole_survivor = self.sole_in_rotation();
        if was_current && sole_survivor.is_none() {
            self.advance();
        }
        Some(RemovalOutcome {
            was_current,
            sole_survivor,
        })
    }

    /// Flip between ACTIVE and DISCONNECTED. Returns false if nothing changed.
    pub fn set_connected(&mut self, user_id: i64, connected: bool) -> bool {
        let Some(idx) = self.seat_index(user_id) else {
            return false;
        };
        let seat = &mut self.seats[idx];
        match (seat.status, connected) {
            (ParticipantStatus::Active, false) => {
                seat.status = ParticipantStatus::Disconnected;
                true
            }
            (ParticipantStatus::Disconnected, true) => {
                seat.status = ParticipantStatus::Active;
                true
            }
            _ => false,
        }
    }

    fn hide_open(&mut self) {
        for pos in self.open.drain(..) {
            if let Some(card) = self.board.cards.get_mut(pos) {
                if card.state == CardState::Revealed {
                    card.state = CardState::Hidden;
                }
            }
        }
    }

    fn advance(&mut self) {
        let n = self.seats.len();
        for step in 1..=n {
            let idx = (self.current + step) % n;
            if self.seats[idx].status.in_rotation() {
                self.current = idx;
                return;
            }
        }
    }
}
