//! Token-bucket rate limiting for outbound fetches.
//!
//! One [`FetchRateLimiter`] is shared by every worker, so the fetch rate toward
//! the remote source is independent of the worker count.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Classic token bucket. A rate of zero means unlimited.
pub struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill_ms: Option<u64>,
}

impl TokenBucket {
    /// Bucket refilling at `rate_per_sec`, holding up to `rate * burst_factor` tokens.
    pub fn new(rate_per_sec: u64, burst_factor: f64) -> Self {
        if rate_per_sec == 0 {
            return TokenBucket {
                tokens: 0.0,
                capacity: 0.0,
                refill_rate: 0.0,
                last_refill_ms: None,
            };
        }
        let capacity = ((rate_per_sec as f64) * burst_factor).max(1.0);
        TokenBucket {
            tokens: capacity,
            capacity,
            refill_rate: rate_per_sec as f64,
            last_refill_ms: None,
        }
    }

    /// Add tokens for the time elapsed since the last refill.
    pub fn refill(&mut self, now_ms: u64) -> f64 {
        if self.is_unlimited() {
            return 0.0;
        }
        if let Some(last) = self.last_refill_ms {
            let elapsed_sec = now_ms.saturating_sub(last) as f64 / 1000.0;
            self.tokens = (self.tokens + elapsed_sec * self.refill_rate).min(self.capacity);
        }
        self.last_refill_ms = Some(now_ms);
        self.tokens
    }

    /// Take `amount` tokens if available.
    pub fn try_consume(&mut self, amount: f64, now_ms: u64) -> bool {
        if self.is_unlimited() {
            return true;
        }
        self.refill(now_ms);
        if self.tokens >= amount {
            self.tokens -= amount;
            true
        } else {
            false
        }
    }

    /// Milliseconds until `amount` tokens will be available.
    pub fn wait_ms_for(&self, amount: f64) -> u64 {
        if self.is_unlimited() || self.tokens >= amount {
            return 0;
        }
        let needed = amount - self.tokens;
        ((needed / self.refill_rate) * 1000.0).ceil() as u64
    }

    /// True when the bucket never throttles.
    pub fn is_unlimited(&self) -> bool {
        self.capacity == 0.0
    }
}

/// Async limiter handing out one token per fetch.
pub struct FetchRateLimiter {
    bucket: Mutex<TokenBucket>,
    epoch: Instant,
}

impl FetchRateLimiter {
    /// Limiter allowing `fetches_per_sec` (0 = unlimited) with a burst of one second.
    pub fn new(fetches_per_sec: u64) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(fetches_per_sec, 1.0)),
            epoch: Instant::now(),
        }
    }

    /// Wait until a fetch is allowed.
    pub async fn acquire(&self) {
        loop {
            let wait_ms = {
                let mut bucket = self.bucket.lock().await;
                if bucket.try_consume(1.0, self.now_ms()) {
                    return;
                }
                bucket.wait_ms_for(1.0).max(1)
            };
            tokio::time::sleep(Duration::from_millis(wait_ms)).await;
        }
    }

    /// True when no limit is configured.
    pub async fn is_unlimited(&self) -> bool {
        self.bucket.lock().await.is_unlimited()
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlimited_bucket() {
        let mut bucket = TokenBucket::new(0, 2.0);
        assert!(bucket.is_unlimited());
        for i in 0..1000 {
            assert!(bucket.try_consume(1.0, i));
        }
        assert_eq!(bucket.wait_ms_for(1.0), 0);
    }

    #[test]
    fn test_burst_then_throttle() {
        let mut bucket = TokenBucket::new(10, 1.0);
        for _ in 0..10 {
            assert!(bucket.try_consume(1.0, 0));
        }
        assert!(!bucket.try_consume(1.0, 0));
        assert_eq!(bucket.wait_ms_for(1.0), 100);
    }

    #[test]
    fn test_refill_over_time() {
        let mut bucket = TokenBucket::new(10, 1.0);
        for _ in 0..10 {
            bucket.try_consume(1.0, 0);
        }
        assert!(!bucket.try_consume(1.0, 50));
        assert!(bucket.try_consume(1.0, 100));
    }

    #[test]
    fn test_refill_capped_at_capacity() {
        let mut bucket = TokenBucket::new(5, 2.0);
        bucket.refill(0);
        let tokens = bucket.refill(60_000);
        assert_eq!(tokens, 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiter_waits_when_empty() {
        let limiter = FetchRateLimiter::new(2);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_unlimited_limiter_never_waits() {
        let limiter = FetchRateLimiter::new(0);
        assert!(limiter.is_unlimited().await);
        for _ in 0..100 {
            limiter.acquire().await;
        }
    }
}
