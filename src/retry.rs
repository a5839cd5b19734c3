//! Retry-as-a-wrapper over a unit-of-work, shared by the Crawler, Downloader,
//! and Processor. Built on `backoff::future::retry` with
//! `ExponentialBackoffBuilder`, wrapped in a reusable policy struct instead
//! of a one-off inline builder.

use backoff::future::retry as backoff_retry;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::time::Duration;

use crate::error::{ErrorCategory, PipelineError};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter: 0.2,
        }
    }

    /// Crawler rate-limit retry policy: 5 attempts, `2^attempt` seconds
    /// capped at 300s.
    pub fn crawler_rate_limit() -> Self {
        Self::new(5, Duration::from_secs(1), Duration::from_secs(300))
    }

    /// Default for git clone / DB / ES calls guarded by a circuit breaker.
    pub fn default_network() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(30))
    }
}

/// Runs `f` under the given policy, retrying only `PipelineError`s whose
/// category is `Transient`. Any other category is returned immediately.
pub async fn retry_with_policy<F, Fut, T>(policy: &RetryPolicy, mut f: F) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let backoff = ExponentialBackoffBuilder::new()
        .with_initial_interval(policy.base_delay)
        .with_max_interval(policy.max_delay)
        .with_randomization_factor(policy.jitter)
        .with_max_elapsed_time(Some(policy.max_delay * policy.max_attempts))
        .build();

    let mut attempt = 0u32;
    backoff_retry(backoff, || {
        attempt += 1;
        let fut = f();
        let max_attempts = policy.max_attempts;
        async move {
            match fut.await {
                Ok(v) => Ok(v),
                Err(e) if e.category() == ErrorCategory::Transient && attempt < max_attempts => {
                    Err(backoff::Error::transient(e))
                }
                Err(e) => Err(backoff::Error::permanent(e)),
            }
        }
    })
    .await
}

/// Sleeps `2^attempt` seconds, capped at `cap`. Used by the Crawler's
/// rate-limit handler, which honors a `Retry-After` header rather than the
/// generic exponential-backoff wrapper above.
pub fn exponential_delay(attempt: u32, cap: Duration) -> Duration {
    let secs = 2u64.saturating_pow(attempt.min(20));
    Duration::from_secs(secs).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(20));
        let result: Result<u32, PipelineError> = retry_with_policy(&policy, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(PipelineError::transient("not yet"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1), Duration::from_millis(20));
        let result: Result<u32, PipelineError> = retry_with_policy(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err(PipelineError::permanent_unit("nope")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn exponential_delay_is_capped() {
        assert_eq!(exponential_delay(0, Duration::from_secs(300)), Duration::from_secs(1));
        assert_eq!(exponential_delay(10, Duration::from_secs(300)), Duration::from_secs(300));
    }
}
