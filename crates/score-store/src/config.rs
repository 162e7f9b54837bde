//! Store configuration.

use std::time::Duration;

/// Tunables for [`AggregateStore`](crate::AggregateStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Upper bound on waiting for any single shard lock during a write.
    pub lock_timeout: Duration,
}

impl StoreConfig {
    /// Creates a config with the given lock timeout.
    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self { lock_timeout }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(250),
        }
    }
}
