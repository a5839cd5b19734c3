//! Circuit breaker wrapping external calls (git, DB, ES): a shared-state
//! struct behind atomics with a timestamp-gated cooldown before the next
//! probe is allowed through.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

/// Failure threshold 5, open timeout 30s, half-open probe count 2.
pub struct CircuitBreaker {
    failure_threshold: u32,
    open_timeout: Duration,
    half_open_probes: u32,
    failures: AtomicU32,
    opened_at: AtomicU64,
    half_open_successes: AtomicU32,
    name: String,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            half_open_probes: 2,
            failures: AtomicU32::new(0),
            opened_at: AtomicU64::new(0),
            half_open_successes: AtomicU32::new(0),
            name: name.into(),
        }
    }

    fn state(&self) -> State {
        let opened_at = self.opened_at.load(Ordering::SeqCst);
        if opened_at == 0 {
            return State::Closed;
        }
        if now_secs().saturating_sub(opened_at) >= self.open_timeout.as_secs() {
            State::HalfOpen
        } else {
            State::Open
        }
    }

    /// Runs `f` guarded by the breaker. Short-circuits with a `Transient`
    /// error (so the retry wrapper backs off) while the breaker is open.
    pub async fn call<F, Fut, T>(&self, f: F) -> Result<T, PipelineError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, PipelineError>>,
    {
        match self.state() {
            State::Open => {
                return Err(PipelineError::transient(format!(
                    "circuit '{}' open, short-circuiting",
                    self.name
                )));
            }
            State::Closed | State::HalfOpen => {}
        }

        match f().await {
            Ok(v) => {
                self.on_success();
                Ok(v)
            }
            Err(e) => {
                self.on_failure();
                Err(e)
            }
        }
    }

    fn on_success(&self) {
        if self.state() == State::HalfOpen {
            let successes = self.half_open_successes.fetch_add(1, Ordering::SeqCst) + 1;
            if successes >= self.half_open_probes {
                self.reset();
            }
        } else {
            self.failures.store(0, Ordering::SeqCst);
        }
    }

    fn on_failure(&self) {
        if self.state() == State::HalfOpen {
            // A probe failed: reopen immediately for another full timeout.
            self.trip();
            return;
        }
        let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.failure_threshold {
            self.trip();
        }
    }

    fn trip(&self) {
        self.opened_at.store(now_secs(), Ordering::SeqCst);
        self.half_open_successes.store(0, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.opened_at.store(0, Ordering::SeqCst);
        self.failures.store(0, Ordering::SeqCst);
        self.half_open_successes.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trips_after_threshold_failures() {
        let cb = CircuitBreaker::new("test");
        for _ in 0..5 {
            let _ = cb
                .call(|| async { Err::<(), _>(PipelineError::transient("boom")) })
                .await;
        }
        let result = cb.call(|| async { Ok::<_, PipelineError>(1) }).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("circuit"));
    }

    #[tokio::test]
    async fn stays_closed_below_threshold() {
        let cb = CircuitBreaker::new("test2");
        for _ in 0..4 {
            let _ = cb
                .call(|| async { Err::<(), _>(PipelineError::transient("boom")) })
                .await;
        }
        let result = cb.call(|| async { Ok::<_, PipelineError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
