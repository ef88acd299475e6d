//! SeaORM -> DomainError translation helpers.
//!
//! Repositories convert `sea_orm::DbErr` into `DomainError` here; higher layers
//! map `DomainError` to `AppError` via `From`.

use tracing::{error, warn};

use crate::errors::domain::{ConflictKind, DomainError, InfraErrorKind, NotFoundKind, ValidationKind};
use crate::logging::pii::Redacted;

fn mentions_sqlstate(msg: &str, code: &str) -> bool {
    msg.contains(&format!("SQLSTATE({code})")) || msg.contains(&format!("code: {code}")) || msg.contains(code)
}

/// Whether a unique-index failure came from the ledger idempotency keys.
pub fn is_ledger_key_violation(msg: &str) -> bool {
    msg.contains("ux_ledger_entries_account_session_kind")
        || msg.contains("ux_ledger_entries_kind_external_ref")
        || msg.contains("ledger_entries.account_id, ledger_entries.session_id, ledger_entries.kind")
        || msg.contains("ledger_entries.kind, ledger_entries.external_ref")
}

/// Translate a `DbErr` into a `DomainError` with sanitized, PII-safe detail.
pub fn map_db_err(e: sea_orm::DbErr) -> DomainError {
    let error_msg = e.to_string();

    match &e {
        sea_orm::DbErr::RecordNotFound(_) => {
            return DomainError::not_found(
                NotFoundKind::Other("Record".into()),
                "Record not found",
            );
        }
        sea_orm::DbErr::ConnectionAcquire(_) => {
            warn!(raw_error = %Redacted(&error_msg), "connection pool exhausted");
            return DomainError::infra(InfraErrorKind::Timeout, "Database pool timeout");
        }
        sea_orm::DbErr::Conn(_) => {
            warn!(raw_error = %Redacted(&error_msg), "database unavailable");
            return DomainError::infra(InfraErrorKind::DbUnavailable, "Database unavailable");
        }
        _ => {}
    }

    // Serializable isolation aborts; the owning operation retries.
    if mentions_sqlstate(&error_msg, "40001")
        || mentions_sqlstate(&error_msg, "40P01")
        || error_msg.contains("could not serialize access")
        || error_msg.contains("database is locked")
        || error_msg.contains("SQLITE_BUSY")
    {
        warn!(raw_error = %Redacted(&error_msg), "serialization failure");
        return DomainError::infra(
            InfraErrorKind::SerializationFailure,
            "Concurrent update, please retry",
        );
    }

    if mentions_sqlstate(&error_msg, "23505")
        || error_msg.contains("duplicate key value violates unique constraint")
        || error_msg.contains("UNIQUE constraint failed")
    {
        warn!(raw_error = %Redacted(&error_msg), "unique constraint violation");
        let detail = if is_ledger_key_violation(&error_msg) {
            "Ledger entry already exists for this key"
        } else {
            "Unique constraint violation"
        };
        return DomainError::conflict(ConflictKind::DuplicateKey, detail);
    }

    if mentions_sqlstate(&error_msg, "23514") || error_msg.contains("CHECK constraint failed") {
        // Only the balance columns carry CHECKs.
        error!(raw_error = %Redacted(&error_msg), "check constraint violation");
        return DomainError::invariant("Balance would become negative");
    }

    if mentions_sqlstate(&error_msg, "23503") || error_msg.contains("FOREIGN KEY constraint failed")
    {
        warn!(raw_error = %Redacted(&error_msg), "foreign key violation");
        return DomainError::validation(
            ValidationKind::Other("ForeignKey".into()),
            "Referenced record does not exist",
        );
    }

    if error_msg.contains("timeout") || error_msg.contains("timed out") {
        warn!(raw_error = %Redacted(&error_msg), "database timeout");
        return DomainError::infra(InfraErrorKind::Timeout, "Database timeout");
    }

    error!(raw_error = %Redacted(&error_msg), "unhandled database error");
    DomainError::infra(
        InfraErrorKind::Other("DbErr".into()),
        "Database operation failed",
    )
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        map_db_err(e)
    }
}
