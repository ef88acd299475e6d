//! Jittered exponential backoff for operations that may fail transiently.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::errors::domain::{DomainError, InfraErrorKind};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_pct: f64,
    /// Upper bound on a single attempt; exceeding it counts as a transient timeout.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: usize,
        base_delay_ms: u64,
        max_delay_ms: u64,
        jitter_pct: f64,
        attempt_timeout: Duration,
    ) -> Self {
        let base = base_delay_ms.max(1);
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: base,
            max_delay_ms: max_delay_ms.max(base),
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
            attempt_timeout,
        }
    }

    /// Delay before retry number `attempt + 1`.
    pub fn next_delay(&self, attempt: usize) -> Duration {
        let exp = 2_u64.saturating_pow(attempt.min(32) as u32);
        let delay = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        let spread = (delay as f64 * self.jitter_pct) as i64;
        let delay = if spread > 0 {
            delay.saturating_add_signed(rand::rng().random_range(-spread..=spread))
        } else {
            delay
        };
        Duration::from_millis(delay)
    }

    /// Run `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. Each attempt is bounded by `attempt_timeout`.
    pub async fn run<F, Fut, T>(&self, op_name: &'static str, mut op: F) -> Result<T, DomainError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.attempt_timeout, op(attempt)).await {
                Ok(res) => res,
                Err(_) => Err(DomainError::infra(
                    InfraErrorKind::Timeout,
                    format!("{op_name} exceeded {:?}", self.attempt_timeout),
                )),
            };
            match outcome {
                Ok(val) => return Ok(val),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!(op = op_name, attempts = attempt, error = %err, "retries exhausted");
                        return Err(err);
                    }
                    let delay = self.next_delay(attempt - 1);
                    warn!(op = op_name, attempt, delay_ms = delay.as_millis() as u64, error = %err, "transient failure, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, 50, 2_000, 0.25, Duration::from_secs(5))
    }
}
