//! Domain-level error type used across services and repositories.
//!
//! This error type is HTTP- and DB-agnostic. Boundary code converts it into
//! `crate::error::AppError` through `From<DomainError>`.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Bad input, rejected before any state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationKind {
    InvalidAmount,
    InvalidPoolKey,
    InvalidAction,
    Other(String),
}

/// Business rule refusals. Surfaced to the caller, never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessKind {
    InsufficientFunds,
    AlreadyQueued,
    AlreadyInSession,
    NotYourTurn,
    TurnLocked,
    SessionNotActive,
    NotAParticipant,
}

/// Infra error kinds to distinguish operational failures
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InfraErrorKind {
    Timeout,
    DbUnavailable,
    LedgerUnavailable,
    /// Serializable isolation aborted the transaction (40001/40P01)
    SerializationFailure,
    DataCorruption,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotFoundKind {
    Account,
    Session,
    Participant,
    Withdrawal,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConflictKind {
    /// A unique index rejected the write
    DuplicateKey,
    OptimisticLock,
    Other(String),
}

/// Central domain error type
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    Validation(ValidationKind, String),
    Business(BusinessKind, String),
    Conflict(ConflictKind, String),
    NotFound(NotFoundKind, String),
    Infra(InfraErrorKind, String),
    /// Money or state invariant broken; requires manual reconciliation
    Invariant(String),
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DomainError::Validation(kind, d) => write!(f, "validation {kind:?}: {d}"),
            DomainError::Business(kind, d) => write!(f, "business rule {kind:?}: {d}"),
            DomainError::Conflict(kind, d) => write!(f, "conflict {kind:?}: {d}"),
            DomainError::NotFound(kind, d) => write!(f, "not found {kind:?}: {d}"),
            DomainError::Infra(kind, d) => write!(f, "infra {kind:?}: {d}"),
            DomainError::Invariant(d) => write!(f, "invariant violation: {d}"),
        }
    }
}

impl Error for DomainError {}

impl DomainError {
    pub fn validation(kind: ValidationKind, detail: impl Into<String>) -> Self {
        Self::Validation(kind, detail.into())
    }
    pub fn business(kind: BusinessKind, detail: impl Into<String>) -> Self {
        Self::Business(kind, detail.into())
    }
    pub fn conflict(kind: ConflictKind, detail: impl Into<String>) -> Self {
        Self::Conflict(kind, detail.into())
    }
    pub fn not_found(kind: NotFoundKind, detail: impl Into<String>) -> Self {
        Self::NotFound(kind, detail.into())
    }
    pub fn infra(kind: InfraErrorKind, detail: impl Into<String>) -> Self {
        Self::Infra(kind, detail.into())
    }
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::Invariant(detail.into())
    }

    /// Whether the owning call site may retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DomainError::Infra(
                InfraErrorKind::Timeout
                    | InfraErrorKind::DbUnavailable
                    | InfraErrorKind::LedgerUnavailable
                    | InfraErrorKind::SerializationFailure,
                _
            )
        )
    }

    pub fn is_business(&self, kind: BusinessKind) -> bool {
        matches!(self, DomainError::Business(k, _) if *k == kind)
    }
}
