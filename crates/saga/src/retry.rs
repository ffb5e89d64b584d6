//! Bounded retry with backoff.
//!
//! The engine does not inspect error kinds: every failure is retried until the
//! attempt bound is reached. Callers that must not retry a particular error
//! handle it before invoking [`execute_with_retry`].
//!
//! Delays go through `tokio::time::sleep`, so tests running on a paused tokio
//! clock see no wall-clock delay.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::RetriesExhausted;

/// Delay inserted after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Wait the same duration after every failure.
    Fixed(Duration),
    /// Wait `step * n` after the n-th failed attempt.
    Linear(Duration),
}

impl Backoff {
    /// Delay to wait after attempt number `attempt` (1-based) failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => *delay,
            Backoff::Linear(step) => step.saturating_mul(attempt),
        }
    }
}

/// Attempt bound and backoff for a retried operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// A single attempt, no retry.
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            backoff: Backoff::None,
        }
    }

    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
        }
    }

    pub const fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear(step),
        }
    }

    /// Catalog lookups in tolerant mode: 4 attempts, 500ms apart.
    pub const fn quote_lookup() -> Self {
        Self::fixed(4, Duration::from_millis(500))
    }

    /// Synchronous loyalty credit in tolerant mode: 3 attempts, 100ms then 200ms.
    pub const fn bonus_credit() -> Self {
        Self::linear(3, Duration::from_millis(100))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

/// Runs `operation` until it succeeds or `policy.max_attempts` attempts failed.
///
/// The first attempt runs immediately. After failed attempt `n` the engine
/// sleeps `policy.backoff.delay(n)` before trying again; there is no sleep
/// after the final attempt. A policy with `max_attempts == 0` still makes one
/// attempt.
pub async fn execute_with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetriesExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        metrics::counter!("retry_attempts_total", "operation" => operation_name.to_string())
            .increment(1);

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation = operation_name, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    "attempt failed"
                );

                if attempt >= max_attempts {
                    return Err(RetriesExhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }

                let delay = policy.backoff.delay(attempt);
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
