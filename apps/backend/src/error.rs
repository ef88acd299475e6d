use actix_web::error::ResponseError;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Serialize;
use thiserror::Error;

use crate::errors::domain::{
    BusinessKind, ConflictKind, DomainError, InfraErrorKind, NotFoundKind, ValidationKind,
};
use crate::errors::ErrorCode;

#[derive(Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub type_: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    pub code: String,
}

/// Boundary error: a stable code plus an actionable, user-safe detail.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {detail}")]
    Validation { code: ErrorCode, detail: String },
    #[error("Rejected: {detail}")]
    Rejected { code: ErrorCode, detail: String },
    #[error("Not found: {detail}")]
    NotFound { code: ErrorCode, detail: String },
    #[error("Conflict: {detail}")]
    Conflict { code: ErrorCode, detail: String },
    #[error("Unavailable: {detail}")]
    Unavailable { code: ErrorCode, detail: String },
    #[error("Timeout: {detail}")]
    Timeout { detail: String },
    #[error("Internal error: {detail}")]
    Internal { code: ErrorCode, detail: String },
    #[error("Configuration error: {detail}")]
    Config { detail: String },
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { code, .. }
            | AppError::Rejected { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Unavailable { code, .. }
            | AppError::Internal { code, .. } => *code,
            AppError::Timeout { .. } => ErrorCode::DbTimeout,
            AppError::Config { .. } => ErrorCode::ConfigError,
        }
    }

    /// Detail shown to clients. Operational failures never expose internals.
    fn public_detail(&self) -> String {
        match self {
            AppError::Validation { detail, .. }
            | AppError::Rejected { detail, .. }
            | AppError::NotFound { detail, .. }
            | AppError::Conflict { detail, .. } => detail.clone(),
            AppError::Unavailable { .. } | AppError::Timeout { .. } => {
                "Service temporarily unavailable, please retry".to_string()
            }
            AppError::Internal { .. } | AppError::Config { .. } => {
                "Internal error".to_string()
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Rejected { code, .. } => match code {
                ErrorCode::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
                ErrorCode::NotAParticipant => StatusCode::FORBIDDEN,
                _ => StatusCode::CONFLICT,
            },
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal { .. } | AppError::Config { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            code: ErrorCode::Internal,
            detail: detail.into(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        Self::Config {
            detail: detail.into(),
        }
    }

    fn humanize_code(code: &str) -> String {
        code.split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => first
                        .to_uppercase()
                        .chain(chars.flat_map(char::to_lowercase))
                        .collect(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(kind, _) => {
                let (code, detail) = match kind {
                    ValidationKind::InvalidAmount => {
                        (ErrorCode::InvalidAmount, "Amount must be a positive whole number")
                    }
                    ValidationKind::InvalidPoolKey => (
                        ErrorCode::InvalidPoolKey,
                        "Unsupported game, party size or entry fee",
                    ),
                    ValidationKind::InvalidAction => {
                        (ErrorCode::InvalidAction, "That card cannot be revealed")
                    }
                    _ => (ErrorCode::ValidationError, "The request is invalid"),
                };
                AppError::Validation {
                    code,
                    detail: detail.to_string(),
                }
            }
            DomainError::Business(kind, _) => {
                let (code, detail) = match kind {
                    BusinessKind::InsufficientFunds => {
                        (ErrorCode::InsufficientFunds, "Insufficient balance")
                    }
                    BusinessKind::AlreadyQueued => (ErrorCode::AlreadyQueued, "Already in a queue"),
                    BusinessKind::AlreadyInSession => {
                        (ErrorCode::AlreadyInSession, "Already playing in another session")
                    }
                    BusinessKind::NotYourTurn => (ErrorCode::NotYourTurn, "It is not your turn"),
                    BusinessKind::TurnLocked => {
                        (ErrorCode::TurnLocked, "The previous move is still resolving")
                    }
                    BusinessKind::SessionNotActive => {
                        (ErrorCode::SessionNotActive, "This session is no longer active")
                    }
                    BusinessKind::NotAParticipant => {
                        (ErrorCode::NotAParticipant, "You are not part of this session")
                    }
                };
                AppError::Rejected {
                    code,
                    detail: detail.to_string(),
                }
            }
            DomainError::NotFound(kind, _) => {
                let (code, detail) = match kind {
                    NotFoundKind::Account => (ErrorCode::AccountNotFound, "Account not found"),
                    NotFoundKind::Session => (ErrorCode::SessionNotFound, "Session not found"),
                    NotFoundKind::Participant => {
                        (ErrorCode::ParticipantNotFound, "Participant not found")
                    }
                    NotFoundKind::Withdrawal => {
                        (ErrorCode::WithdrawalNotFound, "Withdrawal not found")
                    }
                    _ => (ErrorCode::NotFound, "Not found"),
                };
                AppError::NotFound {
                    code,
                    detail: detail.to_string(),
                }
            }
            DomainError::Conflict(kind, _) => {
                let (code, detail) = match kind {
                    ConflictKind::DuplicateKey => {
                        (ErrorCode::UniqueViolation, "This reference is already in use")
                    }
                    ConflictKind::OptimisticLock => {
                        (ErrorCode::OptimisticLock, "The resource changed, please retry")
                    }
                    ConflictKind::Other(ref what) if what == "WithdrawalFailed" => {
                        (ErrorCode::Conflict, "The withdrawal has already failed")
                    }
                    ConflictKind::Other(ref what) if what == "WithdrawalCompleted" => {
                        (ErrorCode::Conflict, "The withdrawal has already completed")
                    }
                    _ => (ErrorCode::Conflict, "The request conflicts with the current state"),
                };
                AppError::Conflict {
                    code,
                    detail: detail.to_string(),
                }
            }
            DomainError::Infra(kind, detail) => match kind {
                InfraErrorKind::Timeout => AppError::Timeout { detail },
                InfraErrorKind::DbUnavailable => AppError::Unavailable {
                    code: ErrorCode::DbUnavailable,
                    detail,
                },
                InfraErrorKind::LedgerUnavailable => AppError::Unavailable {
                    code: ErrorCode::LedgerUnavailable,
                    detail,
                },
                InfraErrorKind::SerializationFailure => AppError::Unavailable {
                    code: ErrorCode::SerializationFailure,
                    detail,
                },
                InfraErrorKind::DataCorruption => AppError::Internal {
                    code: ErrorCode::DataCorruption,
                    detail,
                },
                _ => AppError::internal(detail),
            },
            DomainError::Invariant(detail) => AppError::Internal {
                code: ErrorCode::InvariantViolation,
                detail,
            },
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        crate::infra::db_errors::map_db_err(e).into()
    }
}

impl From<db_infra::DbInfraError> for AppError {
    fn from(e: db_infra::DbInfraError) -> Self {
        AppError::config(e.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.status()
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status();
        let code = self.code().as_str();

        let problem_details = ProblemDetails {
            type_: format!(
                "https://arena.invalid/errors/{}",
                code.to_ascii_lowercase().replace('_', "-")
            ),
            title: Self::humanize_code(code),
            status: status.as_u16(),
            detail: self.public_detail(),
            code: code.to_string(),
        };

        HttpResponse::build(status)
            .content_type("application/problem+json")
            .json(problem_details)
    }
}
