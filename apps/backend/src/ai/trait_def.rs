//! Move-decision provider trait.

use std::fmt;
use std::time::Duration;

use crate::domain::Board;
use crate::errors::domain::{DomainError, InfraErrorKind};

/// Errors that can occur while choosing a move.
#[derive(Debug)]
pub enum AiError {
    /// No hidden card is left to reveal
    NoLegalMove,
    /// Provider state is unusable (e.g. a poisoned lock)
    Internal(String),
}

impl fmt::Display for AiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiError::NoLegalMove => write!(f, "no legal move available"),
            AiError::Internal(msg) => write!(f, "provider internal error: {msg}"),
        }
    }
}

impl std::error::Error for AiError {}

impl From<AiError> for DomainError {
    fn from(err: AiError) -> Self {
        DomainError::infra(InfraErrorKind::Other("Provider".into()), err.to_string())
    }
}

/// A chosen card and how long to wait before revealing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub position: usize,
    pub delay: Duration,
}

/// Chooses moves for a synthetic participant.
///
/// The session drives the provider exactly like a human: it asks for one
/// reveal at a time, then applies it through the normal action path, so
/// turn rules hold regardless of what the provider picks.
pub trait MoveDecisionProvider: Send + Sync {
    /// Pick a hidden position. `open` holds the positions already face up in
    /// the current turn unit.
    fn decide(&self, board: &Board, open: &[usize]) -> Result<Decision, AiError>;

    /// Called for every card any participant reveals.
    fn observe(&self, _position: usize, _face: u8) {}
}
