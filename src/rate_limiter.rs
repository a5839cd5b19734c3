//! Global async token-bucket rate limiter.
//!
//! The Crawler needs one request per 3 seconds globally and the Downloader
//! needs one clone start per 500ms globally. Both are the same shape: a
//! single shared gate all workers wait on, built around an async-aware
//! mutex so waiters actually sleep instead of busy-polling.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RateLimiter {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn per_second(rate: f64) -> Self {
        let secs = if rate > 0.0 { 1.0 / rate } else { 0.0 };
        Self::new(Duration::from_secs_f64(secs))
    }

    /// Blocks until a token is available, then consumes it.
    pub async fn acquire(&self) {
        let mut guard = self.last.lock().await;
        let now = Instant::now();
        if let Some(prev) = *guard {
            let elapsed = now.duration_since(prev);
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *guard = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serializes_acquisitions_at_interval() {
        let limiter = RateLimiter::new(Duration::from_millis(20));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn per_second_conversion() {
        let limiter = RateLimiter::per_second(2.0);
        assert_eq!(limiter.interval, Duration::from_millis(500));
    }
}
