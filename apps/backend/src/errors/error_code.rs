//! Error codes for the arena's boundary errors.
//!
//! All codes are SCREAMING_SNAKE_CASE and map 1:1 to the strings that appear
//! in problem-details responses. Add new codes here; never pass ad-hoc strings.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Request validation
    InvalidAmount,
    InvalidPoolKey,
    InvalidAction,
    ValidationError,

    // Business rules
    InsufficientFunds,
    AlreadyQueued,
    AlreadyInSession,
    NotYourTurn,
    TurnLocked,
    SessionNotActive,
    NotAParticipant,

    // Not found
    AccountNotFound,
    SessionNotFound,
    ParticipantNotFound,
    WithdrawalNotFound,
    NotFound,

    // Conflicts
    UniqueViolation,
    OptimisticLock,
    Conflict,

    // System
    DbUnavailable,
    DbTimeout,
    LedgerUnavailable,
    SerializationFailure,
    DataCorruption,
    InvariantViolation,
    ConfigError,
    Internal,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InvalidPoolKey => "INVALID_POOL_KEY",
            Self::InvalidAction => "INVALID_ACTION",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InsufficientFunds => "INSUFFICIENT_FUNDS",
            Self::AlreadyQueued => "ALREADY_QUEUED",
            Self::AlreadyInSession => "ALREADY_IN_SESSION",
            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::TurnLocked => "TURN_LOCKED",
            Self::SessionNotActive => "SESSION_NOT_ACTIVE",
            Self::NotAParticipant => "NOT_A_PARTICIPANT",
            Self::AccountNotFound => "ACCOUNT_NOT_FOUND",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::ParticipantNotFound => "PARTICIPANT_NOT_FOUND",
            Self::WithdrawalNotFound => "WITHDRAWAL_NOT_FOUND",
            Self::NotFound => "NOT_FOUND",
            Self::UniqueViolation => "UNIQUE_VIOLATION",
            Self::OptimisticLock => "OPTIMISTIC_LOCK",
            Self::Conflict => "CONFLICT",
            Self::DbUnavailable => "DB_UNAVAILABLE",
            Self::DbTimeout => "DB_TIMEOUT",
            Self::LedgerUnavailable => "LEDGER_UNAVAILABLE",
            Self::SerializationFailure => "SERIALIZATION_FAILURE",
            Self::DataCorruption => "DATA_CORRUPTION",
            Self::InvariantViolation => "INVARIANT_VIOLATION",
            Self::ConfigError => "CONFIG_ERROR",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
