use std::future::Future;
use std::pin::Pin;

use sea_orm::{
    ConnectionTrait, DatabaseBackend, DatabaseConnection, DatabaseTransaction, IsolationLevel,
    TransactionTrait,
};
use tracing::warn;

use crate::errors::domain::{DomainError, InfraErrorKind};
use crate::infra::db_errors::map_db_err;
use crate::infra::retry::RetryPolicy;

pub type TxnFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, DomainError>> + Send + 'c>>;

/// Begin a transaction at the strongest isolation the backend offers.
///
/// SQLite serializes writers on its own; Postgres needs SERIALIZABLE requested.
pub async fn begin(db: &DatabaseConnection) -> Result<DatabaseTransaction, DomainError> {
    let txn = match db.get_database_backend() {
        DatabaseBackend::Postgres => {
            db.begin_with_config(Some(IsolationLevel::Serializable), None)
                .await
        }
        _ => db.begin().await,
    };
    txn.map_err(map_db_err)
}

/// Commit on `Ok`, roll back on `Err` and hand the original error back.
pub async fn finish<T>(
    txn: DatabaseTransaction,
    out: Result<T, DomainError>,
) -> Result<T, DomainError> {
    match out {
        Ok(val) => {
            txn.commit().await.map_err(map_db_err)?;
            Ok(val)
        }
        Err(err) => {
            if let Err(rb) = txn.rollback().await {
                warn!(error = %rb, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Run `f` inside one transaction.
pub async fn with_txn<T, F>(db: &DatabaseConnection, f: F) -> Result<T, DomainError>
where
    F: for<'c> FnOnce(&'c DatabaseTransaction) -> TxnFuture<'c, T>,
{
    let txn = begin(db).await?;
    let out = f(&txn).await;
    finish(txn, out).await
}

/// Run `f` in a fresh transaction per attempt, retrying while the error is
/// transient. Each attempt is bounded by the policy's attempt timeout.
pub async fn with_retrying_txn<T, F>(
    db: &DatabaseConnection,
    policy: &RetryPolicy,
    op_name: &'static str,
    mut f: F,
) -> Result<T, DomainError>
where
    F: for<'c> FnMut(&'c DatabaseTransaction) -> TxnFuture<'c, T>,
{
    let mut attempt = 0;
    loop {
        let outcome = match tokio::time::timeout(policy.attempt_timeout, begin(db)).await {
            Err(_) => Err(DomainError::infra(
                InfraErrorKind::Timeout,
                format!("{op_name}: begin timed out"),
            )),
            Ok(Err(e)) => Err(e),
            Ok(Ok(txn)) => {
                match tokio::time::timeout(policy.attempt_timeout, f(&txn)).await {
                    Ok(out) => finish(txn, out).await,
                    Err(_) => {
                        let _ = txn.rollback().await;
                        Err(DomainError::infra(
                            InfraErrorKind::Timeout,
                            format!("{op_name} exceeded {:?}", policy.attempt_timeout),
                        ))
                    }
                }
            }
        };

        match outcome {
            Ok(val) => return Ok(val),
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    warn!(op = op_name, attempts = attempt, error = %err, "transaction retries exhausted");
                    return Err(err);
                }
                let delay = policy.next_delay(attempt - 1);
                warn!(op = op_name, attempt, delay_ms = delay.as_millis() as u64, error = %err, "transaction retry");
                tokio::time::sleep(delay).await;
            }
        }
    }
}
