//! Worker configuration.

use gitweld_provider::BackoffPolicy;
use std::time::Duration;

/// Configuration for the sync worker.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum tasks in flight at once.
    pub concurrency: usize,
    /// How often to poll the queue for ready tasks.
    pub poll_interval: Duration,
    /// Active tasks older than this are assumed abandoned and released.
    pub stale_after: Duration,
    /// Maximum tasks claimed per poll.
    pub batch_size: i64,
    /// Retry and backoff policy for failed tasks.
    pub backoff: BackoffPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            poll_interval: Duration::from_secs(1),
            stale_after: Duration::from_secs(300),
            batch_size: 10,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn test_builder() {
        let config = SyncConfig::default()
            .with_concurrency(2)
            .with_batch_size(4);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.batch_size, 4);
    }
}
