//! Worker configuration.

use crate::RetryPolicy;

/// Tunables for [`ScoreEventWorker`](crate::ScoreEventWorker).
///
/// Lane queues are bounded: when a lane is full the dispatcher waits, which
/// stops it pulling from the source. Accepted events are never dropped for
/// lack of room.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of parallel apply lanes. Each exam maps to exactly one lane.
    pub lanes: usize,
    /// Capacity of each lane's queue.
    pub queue_capacity: usize,
    /// How many recent event IDs are remembered for deduplication.
    pub idempotency_capacity: usize,
    /// Retry behaviour for transient store failures.
    pub retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            lanes: 4,
            queue_capacity: 1024,
            idempotency_capacity: 100_000,
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = WorkerConfig::default();
        assert_eq!(config.lanes, 4);
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.idempotency_capacity, 100_000);
        assert_eq!(config.retry, RetryPolicy::default());
    }
}
