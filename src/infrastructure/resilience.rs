//! Retry and timeout combinators for flaky radio operations.

use crate::domain::settings::RetrySettings;
use crate::error::Error;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::warn;

/// Exponential backoff: `initial * multiplier^(failures - 1)`, capped at `max`
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: u32,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Wait before the next attempt, after `failures` consecutive failures
    pub fn delay_after(&self, failures: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(failures.saturating_sub(1));
        self.initial.saturating_mul(factor).min(self.max)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub backoff: BackoffPolicy,
    /// No attempt starts later than this after the first one
    pub deadline: Duration,
    /// Upper bound for a single attempt
    pub attempt_timeout: Duration,
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            backoff: BackoffPolicy {
                initial: Duration::from_millis(settings.initial_backoff_ms),
                multiplier: settings.multiplier,
                max: Duration::from_millis(settings.max_backoff_ms),
            },
            deadline: Duration::from_secs(settings.deadline_secs),
            attempt_timeout: Duration::from_secs(settings.attempt_timeout_secs),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

/// Errors that may succeed when the operation is repeated
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for Error {
    fn is_retryable(&self) -> bool {
        Error::is_retryable(self)
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// A non-retryable failure, returned as is
    #[error(transparent)]
    Aborted(E),
    #[error("gave up after {attempts} attempts in {elapsed:.1?}: {last}")]
    Exhausted {
        attempts: u32,
        elapsed: Duration,
        last: E,
    },
}

impl From<RetryError<Error>> for Error {
    fn from(err: RetryError<Error>) -> Self {
        match err {
            RetryError::Aborted(e) => e,
            RetryError::Exhausted {
                attempts,
                elapsed,
                last,
            } => Error::Exhausted {
                attempts,
                elapsed,
                last: Box::new(last),
            },
        }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// next attempt would start past the policy deadline.
///
/// `op` receives the 1-based attempt number and must start from scratch on
/// every call.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(RetryError::Aborted(e)),
            Err(e) => e,
        };

        let delay = policy.backoff.delay_after(attempt);
        let elapsed = started.elapsed();
        if elapsed + delay > policy.deadline {
            return Err(RetryError::Exhausted {
                attempts: attempt,
                elapsed,
                last: err,
            });
        }

        warn!(
            "Attempt {} failed: {}. Retrying in {:?}...",
            attempt, err, delay
        );
        tokio::time::sleep(delay).await;
    }
}

/// Bound `fut` by `duration`, reporting expiry as [`Error::Timeout`]
pub async fn with_timeout<T, Fut>(duration: Duration, fut: Fut) -> Result<T, Error>
where
    Fut: Future<Output = Result<T, Error>>,
{
    tokio::time::timeout(duration, fut)
        .await
        .map_err(|_| Error::Timeout(duration))?
}
