//! Bounded retry with exponential backoff and jitter.
//!
//! The policy is plain data so each provider can carry its own budget and
//! tests can exercise the delay schedule without any network.

use crate::error::{FetchError, LlmError};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Classifies errors as worth retrying or not.
pub trait Retryable: Sized {
    /// Timeouts, connection failures and 5xx answers.
    fn is_transient(&self) -> bool;

    /// Error produced when one attempt exceeds its time budget.
    fn attempt_timed_out(after: Duration) -> Self;

    /// Minimum wait the server asked for before the next attempt.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout(_) | FetchError::Connect(_) => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::NotFound(_) | FetchError::Decode(_) | FetchError::MissingIdentifier(_) => {
                false
            }
        }
    }

    fn attempt_timed_out(after: Duration) -> Self {
        FetchError::Timeout(after)
    }
}

impl Retryable for LlmError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited { .. }
                | LlmError::ServiceUnavailable(_)
                | LlmError::Timeout(_)
                | LlmError::Transport(_)
        )
    }

    fn attempt_timed_out(after: Duration) -> Self {
        LlmError::Timeout(after)
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after: Some(secs), .. } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Retry budget for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound on the exponential delay (before jitter).
    pub max_delay: Duration,
    /// Relative jitter in `[0, 1]`; 0.25 spreads a delay over ±25%.
    pub jitter: f64,
    /// Time budget of each individual attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.25,
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn no_retry(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            attempt_timeout,
            ..Self::default()
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Delay before the attempt that follows failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let exponential = self
            .base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay);
        let capped = exponential.min(self.max_delay);

        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 {
            return capped;
        }
        let spread = capped.mul_f64(jitter);
        capped.saturating_sub(spread) + spread.mul_f64(2.0 * fastrand::f64())
    }

    /// Run `op` until it succeeds, fails definitively, or the budget is spent.
    ///
    /// Each attempt is bounded by `attempt_timeout`; the last error is returned
    /// when attempts run out.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(self.attempt_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(E::attempt_timed_out(self.attempt_timeout)),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && err.is_transient() => {
                    let backoff = self.delay_for(attempt);
                    let delay = err.retry_after().map_or(backoff, |wait| wait.max(backoff));
                    warn!(
                        "{} attempt {}/{} failed: {} (retrying in {:?})",
                        what, attempt, max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!("{} giving up after {} attempt(s): {}", what, attempt, err);
                    return Err(err);
                }
            }
        }
    }
}
