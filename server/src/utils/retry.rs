//! Async retry utilities with capped exponential backoff

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::core::config::RetryConfig;

/// Bounds for retrying a single logical call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Backoff before the retry that follows failed attempt `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max)`, raised to `hint` but never above `max`.
    pub fn delay_for(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let backoff = self
            .base_delay
            .saturating_mul(2_u32.saturating_pow(exp))
            .min(self.max_delay);
        match hint {
            Some(hint) => backoff.max(hint).min(self.max_delay),
            None => backoff,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay, config.max_delay)
    }
}

/// Whether a failed attempt may be re-issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after backoff; `hint` is the server-suggested minimum wait
    Retry { hint: Option<Duration> },
    /// Surface the error immediately
    Stop,
}

/// Errors that know whether they are worth retrying
pub trait Retryable {
    fn retry_decision(&self) -> RetryDecision;
}

/// Final failure of a retried operation
#[derive(Debug, PartialEq, Eq)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: u32,
    /// True when the error was retryable but the attempt ceiling was reached
    pub exhausted: bool,
}

/// Retry an async operation with capped exponential backoff.
///
/// Non-retryable errors return after the attempt that produced them.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let hint = match e.retry_decision() {
                    RetryDecision::Stop => {
                        return Err(RetryFailure {
                            error: e,
                            attempts,
                            exhausted: false,
                        });
                    }
                    RetryDecision::Retry { hint } => hint,
                };
                if attempts >= policy.max_attempts {
                    return Err(RetryFailure {
                        error: e,
                        attempts,
                        exhausted: true,
                    });
                }
                let delay = policy.delay_for(attempts, hint);
                tracing::warn!(
                    operation = operation_name,
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after retryable error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
