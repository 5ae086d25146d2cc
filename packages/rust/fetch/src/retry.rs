//! Bounded retry with per-attempt deadlines and linear backoff.
//!
//! Each attempt runs under its own deadline; when it fires the attempt's
//! future is dropped, which aborts whatever request it had in flight. Between
//! failed attempts the caller waits `backoff * (attempt_index + 1)`.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use feedmill_shared::FetchSettings;
use tracing::debug;

/// Resilience parameters for one logical request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = `retries + 1`).
    pub retries: u32,
    /// Deadline for a single attempt.
    pub timeout: Duration,
    /// Linear backoff base.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Total number of attempts this policy allows.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Delay after the failed attempt with zero-based index `attempt_index`.
    pub fn backoff_after(&self, attempt_index: u32) -> Duration {
        self.backoff.saturating_mul(attempt_index.saturating_add(1))
    }
}

impl From<FetchSettings> for RetryPolicy {
    fn from(settings: FetchSettings) -> Self {
        Self {
            retries: settings.retries,
            timeout: Duration::from_millis(settings.timeout_ms),
            backoff: Duration::from_millis(settings.backoff_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        FetchSettings::default().into()
    }
}

/// Why a single attempt did not produce a value.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// The deadline fired and the attempt was aborted.
    TimedOut(Duration),
    /// The attempt completed with an error.
    Failed(E),
}

impl<E: fmt::Display> fmt::Display for AttemptError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut(after) => write!(f, "timed out after {}ms", after.as_millis()),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// Every attempt failed. Carries the last attempt's error unchanged.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last: AttemptError<E>,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} attempt(s) failed, last: {}", self.attempts, self.last)
    }
}

/// Run `attempt` until it succeeds or the policy's attempts are used up.
///
/// `attempt` receives the zero-based attempt index.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut attempt: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let total = policy.attempts();
    let mut index = 0;

    loop {
        let error = match tokio::time::timeout(policy.timeout, attempt(index)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => AttemptError::Failed(e),
            Err(_) => AttemptError::TimedOut(policy.timeout),
        };

        if index + 1 >= total {
            return Err(RetryExhausted {
                attempts: total,
                last: error,
            });
        }

        let delay = policy.backoff_after(index);
        debug!(
            attempt = index + 1,
            of = total,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, backing off"
        );
        tokio::time::sleep(delay).await;
        index += 1;
    }
}
