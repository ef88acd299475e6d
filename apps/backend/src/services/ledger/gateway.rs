//! Boundary to the external payment gateway.

use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use crate::logging::pii::Redacted;

/// A payout handed to the gateway for asynchronous completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutRequest {
    pub payout_ref: String,
    pub account_id: i64,
    pub amount: i64,
    /// Destination as given by the user (e-mail or account number)
    pub destination: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway rejected payout: {0}")]
    Rejected(String),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Accepts payouts without blocking. The gateway later reports the result
/// through `LedgerService::complete_withdrawal` / `fail_withdrawal`.
pub trait PaymentGateway: Send + Sync {
    fn submit(&self, payout: PayoutRequest) -> Result<(), GatewayError>;
}

/// Logs and accepts every payout; completion arrives out of band.
#[derive(Debug, Default)]
pub struct LoggingGateway;

impl PaymentGateway for LoggingGateway {
    fn submit(&self, payout: PayoutRequest) -> Result<(), GatewayError> {
        info!(
            payout_ref = %payout.payout_ref,
            account_id = payout.account_id,
            amount = payout.amount,
            destination = %Redacted(&payout.destination),
            "payout submitted"
        );
        Ok(())
    }
}

/// Keeps submitted payouts in memory; can be told to refuse them.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    submitted: Mutex<Vec<PayoutRequest>>,
    refuse: Mutex<bool>,
}

impl RecordingGateway {
    pub fn refuse_next(&self, refuse: bool) {
        *self.refuse.lock() = refuse;
    }

    pub fn submitted(&self) -> Vec<PayoutRequest> {
        self.submitted.lock().clone()
    }
}

impl PaymentGateway for RecordingGateway {
    fn submit(&self, payout: PayoutRequest) -> Result<(), GatewayError> {
        if std::mem::take(&mut *self.refuse.lock()) {
            return Err(GatewayError::Rejected(payout.payout_ref));
        }
        self.submitted.lock().push(payout);
        Ok(())
    }
}
