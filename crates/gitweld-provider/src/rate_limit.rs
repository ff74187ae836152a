//! Client-side token-bucket rate limiting.
//!
//! Each REST client holds a bucket and acquires a token before every
//! outbound call, keeping the engine under the provider's budget even when
//! the worker is running at full concurrency.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Token bucket rate limiter.
pub struct TokenBucket {
    /// Maximum tokens in the bucket.
    capacity: u64,
    /// Current number of tokens.
    tokens: AtomicU64,
    /// Tokens to add per refill.
    refill_rate: u64,
    /// Refill interval.
    refill_interval: Duration,
    /// Last refill time.
    last_refill: Mutex<Instant>,
}

impl TokenBucket {
    #[must_use]
    pub fn new(capacity: u64, refill_rate: u64, refill_interval: Duration) -> Self {
        Self {
            capacity,
            tokens: AtomicU64::new(capacity),
            refill_rate,
            refill_interval,
            last_refill: Mutex::new(Instant::now()),
        }
    }

    /// Create a bucket for N requests per minute, refilled every second.
    #[must_use]
    pub fn per_minute(requests_per_minute: u64) -> Self {
        let refill_rate = requests_per_minute.div_ceil(60);
        Self::new(requests_per_minute, refill_rate, Duration::from_secs(1))
    }

    /// Try to take a token without waiting.
    pub async fn try_acquire(&self) -> bool {
        self.refill().await;

        loop {
            let current = self.tokens.load(Ordering::Relaxed);
            if current == 0 {
                return false;
            }
            if self
                .tokens
                .compare_exchange(current, current - 1, Ordering::SeqCst, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }

    /// Take a token, waiting for a refill if the bucket is empty.
    pub async fn acquire(&self) {
        while !self.try_acquire().await {
            tokio::time::sleep(self.refill_interval / 10).await;
        }
    }

    /// Current number of available tokens.
    pub fn available(&self) -> u64 {
        self.tokens.load(Ordering::Relaxed)
    }

    async fn refill(&self) {
        let mut last_refill = self.last_refill.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(*last_refill);

        if elapsed >= self.refill_interval {
            let intervals = elapsed.as_secs_f64() / self.refill_interval.as_secs_f64();
            let new_tokens = (intervals as u64) * self.refill_rate;

            if new_tokens > 0 {
                loop {
                    let current = self.tokens.load(Ordering::Relaxed);
                    let new_count = (current + new_tokens).min(self.capacity);
                    if self
                        .tokens
                        .compare_exchange(current, new_count, Ordering::SeqCst, Ordering::Relaxed)
                        .is_ok()
                    {
                        break;
                    }
                }
                *last_refill = now;
            }
        }
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}
