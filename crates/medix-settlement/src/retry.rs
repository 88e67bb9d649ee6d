//! # Attempt Retry
//!
//! Runs a settlement attempt again when it loses a race.
//!
//! ```text
//! ┌──────────┐  Ok            ┌──────────┐
//! │ attempt  │ ─────────────► │  return  │
//! └────┬─────┘                └──────────┘
//!      │ ConcurrencyConflict        ▲
//!      ▼                            │ any other error
//! ┌──────────┐  attempts left  ┌────┴─────┐
//! │ backoff  │ ──────────────► │ attempt  │
//! └────┬─────┘                 └──────────┘
//!      │ attempts exhausted
//!      ▼
//! TransientFailure { attempts }
//! ```
//!
//! Every attempt runs in its own transaction, so a failed one leaves no
//! trace and the next one re-reads current state.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, warn};

use crate::error::{SettlementError, SettlementResult};

/// Bounded exponential backoff between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Runs `attempt` until it succeeds, fails for a non-retryable reason,
    /// or `max_attempts` is reached.
    ///
    /// The closure receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt: F) -> SettlementResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = SettlementResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let max_attempts = self.max_attempts.max(1);
        let mut attempt_no = 0;

        loop {
            attempt_no += 1;

            let err = match attempt(attempt_no).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_conflict() => err,
                Err(err) => return Err(err),
            };

            if attempt_no >= max_attempts {
                warn!(
                    operation,
                    attempts = attempt_no,
                    error = %err,
                    "Giving up after repeated conflicts"
                );
                return Err(SettlementError::TransientFailure {
                    attempts: attempt_no,
                    last_error: err.to_string(),
                });
            }

            let delay = backoff.next_backoff().unwrap_or(self.max_backoff);
            debug!(
                operation,
                attempt = attempt_no,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Attempt conflicted, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Creates the exponential backoff configuration.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
