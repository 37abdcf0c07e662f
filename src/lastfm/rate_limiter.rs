// Request pacing for the Last.fm API.
//
// Last.fm asks clients to stay under roughly five requests per second per
// API key. Profile acquisition for a session fans out across participants,
// so every request goes through this limiter: each caller waits until at
// least `interval` has passed since the previous request was let through.

use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// A simple rate limiter that enforces a maximum request rate.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Mutex<RateLimiterInner>>,
}

struct RateLimiterInner {
    /// Minimum time between requests
    interval: Duration,
    /// When the last request was allowed through
    last_request: Option<Instant>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_second` requests per second.
    ///
    /// A non-positive rate disables pacing.
    pub fn new(requests_per_second: f64) -> Self {
        let interval = if requests_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / requests_per_second)
        } else {
            Duration::ZERO
        };
        Self {
            inner: Arc::new(Mutex::new(RateLimiterInner {
                interval,
                last_request: None,
            })),
        }
    }

    /// Wait until a request is allowed, then return.
    ///
    /// The lock is held while sleeping so that concurrent callers queue up
    /// one interval apart instead of waking together.
    pub async fn acquire(&self) {
        let mut inner = self.inner.lock().await;

        if let Some(last) = inner.last_request {
            let elapsed = Instant::now().duration_since(last);
            if elapsed < inner.interval {
                tokio::time::sleep(inner.interval - elapsed).await;
            }
        }

        inner.last_request = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(1.0);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_second_request_waits_one_interval() {
        let limiter = RateLimiter::new(20.0);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_zero_rate_disables_pacing() {
        let limiter = RateLimiter::new(0.0);
        let start = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
