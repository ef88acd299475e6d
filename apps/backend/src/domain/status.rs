use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::domain::DomainError;

/// Session lifecycle. Transitions only move forward; terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Waiting,
    Playing,
    SettlementPending,
    Finished,
    Cancelled,
    /// Settlement hit an invariant violation; manual reconciliation only
    Frozen,
}

impl SessionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Playing => "PLAYING",
            Self::SettlementPending => "SETTLEMENT_PENDING",
            Self::Finished => "FINISHED",
            Self::Cancelled => "CANCELLED",
            Self::Frozen => "FROZEN",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled | Self::Frozen)
    }

    /// Statuses that hold their participants until money has moved.
    pub const OCCUPYING: [SessionStatus; 3] =
        [Self::Waiting, Self::Playing, Self::SettlementPending];

    /// Sessions that hold their participants: nobody may join elsewhere.
    /// FROZEN releases them; the money is left for manual reconciliation.
    pub const fn occupies_participants(self) -> bool {
        matches!(self, Self::Waiting | Self::Playing | Self::SettlementPending)
    }

    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Waiting, Playing) | (Waiting, SettlementPending) => true,
            (Playing, SettlementPending) => true,
            (SettlementPending, Finished) | (SettlementPending, Cancelled) => true,
            (from, Frozen) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "WAITING" => Self::Waiting,
            "PLAYING" => Self::Playing,
            "SETTLEMENT_PENDING" => Self::SettlementPending,
            "FINISHED" => Self::Finished,
            "CANCELLED" => Self::Cancelled,
            "FROZEN" => Self::Frozen,
            other => {
                return Err(DomainError::invariant(format!(
                    "unknown session status '{other}'"
                )))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParticipantStatus {
    Active,
    Disconnected,
    Eliminated,
    Quit,
}

impl ParticipantStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Disconnected => "DISCONNECTED",
            Self::Eliminated => "ELIMINATED",
            Self::Quit => "QUIT",
        }
    }

    /// Still part of the turn rotation.
    pub const fn in_rotation(self) -> bool {
        matches!(self, Self::Active | Self::Disconnected)
    }
}

impl FromStr for ParticipantStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ACTIVE" => Self::Active,
            "DISCONNECTED" => Self::Disconnected,
            "ELIMINATED" => Self::Eliminated,
            "QUIT" => Self::Quit,
            other => {
                return Err(DomainError::invariant(format!(
                    "unknown participant status '{other}'"
                )))
            }
        })
    }
}

/// Why a session ended. Each reason resolves to exactly one [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Completed,
    OpponentEliminated,
    OpponentQuit,
    NetworkIssue,
}

impl TerminationReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::OpponentEliminated => "opponent_eliminated",
            Self::OpponentQuit => "opponent_quit",
            Self::NetworkIssue => "network_issue",
        }
    }

    pub const fn pays_winner(self) -> bool {
        !matches!(self, Self::NetworkIssue)
    }

    /// Resolve to an outcome; winner-paying reasons require a winner.
    pub fn outcome(self, winner: Option<i64>) -> Result<Outcome, DomainError> {
        match (self.pays_winner(), winner) {
            (true, Some(user_id)) => Ok(Outcome::Winner(user_id)),
            (false, None) => Ok(Outcome::RefundAll),
            (true, None) => Err(DomainError::invariant(format!(
                "{} requires a winner",
                self.as_str()
            ))),
            (false, Some(_)) => Err(DomainError::invariant(format!(
                "{} cannot have a winner",
                self.as_str()
            ))),
        }
    }
}

impl FromStr for TerminationReason {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "completed" => Self::Completed,
            "opponent_eliminated" => Self::OpponentEliminated,
            "opponent_quit" => Self::OpponentQuit,
            "network_issue" => Self::NetworkIssue,
            other => {
                return Err(DomainError::invariant(format!(
                    "unknown termination reason '{other}'"
                )))
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Winner(i64),
    RefundAll,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Winner(_) => "winner",
            Outcome::RefundAll => "refund_all",
        }
    }
}
