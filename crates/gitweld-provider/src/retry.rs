//! Retry and backoff policy for provider failures.

use crate::error::ProviderError;
use chrono::Utc;
use rand::Rng;
use std::time::Duration;

/// Default base delay between retries.
const DEFAULT_BASE: Duration = Duration::from_secs(2);
/// Default ceiling on any computed delay.
const DEFAULT_CAP: Duration = Duration::from_secs(60);
/// Default cooldown when rate limited without a reset hint.
const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);
/// Default number of attempts before a retryable failure turns terminal.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default jitter fraction applied to exponential delays.
const DEFAULT_JITTER: f64 = 0.2;

/// Exponential backoff with jitter, honoring provider rate-limit resets.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Base delay; attempt `n` waits `base * 2^n` before jitter.
    pub base: Duration,
    /// Ceiling on any computed delay.
    pub cap: Duration,
    /// Attempts allowed before a retryable failure turns terminal.
    pub max_attempts: u32,
    /// Jitter fraction in `0.0..1.0`; delays vary by up to this factor.
    pub jitter: f64,
    /// Cooldown when rate limited and the provider gave no reset time.
    pub rate_limit_cooldown: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE,
            cap: DEFAULT_CAP,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            jitter: DEFAULT_JITTER,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
        }
    }
}

impl BackoffPolicy {
    #[must_use]
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    #[must_use]
    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Whether to retry after `error` when `attempt` attempts have already
    /// been made.
    #[must_use]
    pub fn should_retry(&self, error: &ProviderError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }

    /// Delay before the next attempt. `attempt` is the zero-based count of
    /// attempts already made.
    ///
    /// Rate-limit errors wait for the provider's reset time when one was
    /// given, or a fixed cooldown otherwise. Everything else gets
    /// exponential backoff with jitter, capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        if let ProviderError::RateLimited { reset_at, .. } = error {
            return match reset_at {
                Some(reset) => {
                    let until = (*reset - Utc::now()).num_milliseconds();
                    Duration::from_millis(until.max(0) as u64)
                }
                None => self.rate_limit_cooldown,
            };
        }
        self.exponential(attempt)
    }

    /// Jittered exponential delay for the given zero-based attempt count.
    #[must_use]
    pub fn exponential(&self, attempt: u32) -> Duration {
        let exp = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.cap);
        let jitter = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        let with_jitter = exp.mul_f64(1.0 + jitter);
        with_jitter.min(self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn server_error() -> ProviderError {
        ProviderError::Server {
            status: 502,
            message: "bad gateway".into(),
        }
    }

    #[test]
    fn test_delay_within_jitter_bounds() {
        let policy = BackoffPolicy::default();
        for attempt in 0..4 {
            let nominal = Duration::from_secs(2 * 2u64.pow(attempt));
            let lower = nominal.mul_f64(0.8);
            let upper = nominal.mul_f64(1.2).min(policy.cap);
            for _ in 0..50 {
                let delay = policy.delay_for(attempt, &server_error());
                assert!(
                    delay >= lower && delay <= upper,
                    "attempt {attempt}: {delay:?} outside [{lower:?}, {upper:?}]"
                );
            }
        }
    }

    #[test]
    fn test_delay_never_exceeds_cap() {
        let policy = BackoffPolicy::default();
        for attempt in 0..12 {
            assert!(policy.delay_for(attempt, &server_error()) <= policy.cap);
        }
    }

    #[test]
    fn test_rate_limit_honors_reset_time() {
        let policy = BackoffPolicy::default();
        let err = ProviderError::rate_limited(
            "limited",
            Some(Utc::now() + ChronoDuration::seconds(30)),
        );
        let delay = policy.delay_for(0, &err);
        assert!(delay >= Duration::from_secs(28) && delay <= Duration::from_secs(31));
    }

    #[test]
    fn test_rate_limit_reset_in_past_means_zero_delay() {
        let policy = BackoffPolicy::default();
        let err = ProviderError::rate_limited(
            "limited",
            Some(Utc::now() - ChronoDuration::seconds(10)),
        );
        assert_eq!(policy.delay_for(0, &err), Duration::ZERO);
    }

    #[test]
    fn test_rate_limit_without_reset_uses_cooldown() {
        let policy = BackoffPolicy::default();
        let err = ProviderError::rate_limited("limited", None);
        assert_eq!(policy.delay_for(0, &err), Duration::from_secs(60));
        // Attempt count does not change the cooldown.
        assert_eq!(policy.delay_for(2, &err), Duration::from_secs(60));
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let policy = BackoffPolicy::default();
        let err = server_error();
        assert!(policy.should_retry(&err, 0));
        assert!(policy.should_retry(&err, 2));
        assert!(!policy.should_retry(&err, 3));
        assert!(!policy.should_retry(&err, 10));
    }

    #[test]
    fn test_should_never_retry_fatal_errors() {
        let policy = BackoffPolicy::default();
        assert!(!policy.should_retry(&ProviderError::authentication("nope"), 0));
        assert!(!policy.should_retry(&ProviderError::not_found("repo"), 0));
        assert!(!policy.should_retry(&ProviderError::conflict("422"), 0));
    }
}
