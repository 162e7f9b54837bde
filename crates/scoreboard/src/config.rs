//! Process configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use ingest::{RetryPolicy, WorkerConfig};
use score_store::StoreConfig;

/// Process configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `METRICS_PORT`: Prometheus listener port, `0` disables (default: `9000`)
/// - `WORKER_LANES`: parallel apply lanes (default: `4`)
/// - `WORKER_QUEUE_CAPACITY`: per-lane queue bound (default: `1024`)
/// - `IDEMPOTENCY_CAPACITY`: remembered event IDs (default: `100000`)
/// - `RETRY_MAX_ATTEMPTS`: attempts per event (default: `5`)
/// - `RETRY_INITIAL_DELAY_MS`: first backoff delay (default: `10`)
/// - `RETRY_MAX_DELAY_MS`: backoff cap (default: `1000`)
/// - `STORE_LOCK_TIMEOUT_MS`: shard lock wait bound (default: `250`)
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub metrics_port: u16,
    pub lanes: usize,
    pub queue_capacity: usize,
    pub idempotency_capacity: usize,
    pub retry_max_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub lock_timeout_ms: u64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or unparseable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            metrics_port: parse_var(&lookup, "METRICS_PORT")
                .unwrap_or(defaults.metrics_port),
            lanes: parse_var(&lookup, "WORKER_LANES").unwrap_or(defaults.lanes),
            queue_capacity: parse_var(&lookup, "WORKER_QUEUE_CAPACITY")
                .unwrap_or(defaults.queue_capacity),
            idempotency_capacity: parse_var(&lookup, "IDEMPOTENCY_CAPACITY")
                .unwrap_or(defaults.idempotency_capacity),
            retry_max_attempts: parse_var(&lookup, "RETRY_MAX_ATTEMPTS")
                .unwrap_or(defaults.retry_max_attempts),
            retry_initial_delay_ms: parse_var(&lookup, "RETRY_INITIAL_DELAY_MS")
                .unwrap_or(defaults.retry_initial_delay_ms),
            retry_max_delay_ms: parse_var(&lookup, "RETRY_MAX_DELAY_MS")
                .unwrap_or(defaults.retry_max_delay_ms),
            lock_timeout_ms: parse_var(&lookup, "STORE_LOCK_TIMEOUT_MS")
                .unwrap_or(defaults.lock_timeout_ms),
        }
    }

    /// Returns the store configuration.
    pub fn store(&self) -> StoreConfig {
        StoreConfig::with_lock_timeout(Duration::from_millis(self.lock_timeout_ms))
    }

    /// Returns the worker configuration.
    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            lanes: self.lanes,
            queue_capacity: self.queue_capacity,
            idempotency_capacity: self.idempotency_capacity,
            retry: RetryPolicy {
                max_attempts: self.retry_max_attempts,
                initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
            },
        }
    }

    /// Returns the metrics listener port, or `None` when metrics are disabled.
    pub fn metrics_port(&self) -> Option<u16> {
        (self.metrics_port != 0).then_some(self.metrics_port)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        let worker = WorkerConfig::default();
        Self {
            log_level: "info".to_string(),
            metrics_port: 9000,
            lanes: worker.lanes,
            queue_capacity: worker.queue_capacity,
            idempotency_capacity: worker.idempotency_capacity,
            retry_max_attempts: worker.retry.max_attempts,
            retry_initial_delay_ms: 10,
            retry_max_delay_ms: 1000,
            lock_timeout_ms: 250,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.metrics_port(), Some(9000));
        assert_eq!(config.lanes, 4);
        assert_eq!(config.worker().retry, RetryPolicy::default());
        assert_eq!(config.store().lock_timeout, StoreConfig::default().lock_timeout);
    }

    #[test]
    fn test_lookup_overrides() {
        let env: HashMap<&str, &str> = [
            ("RUST_LOG", "debug"),
            ("METRICS_PORT", "0"),
            ("WORKER_LANES", "16"),
            ("RETRY_MAX_ATTEMPTS", "2"),
            ("STORE_LOCK_TIMEOUT_MS", "75"),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.metrics_port(), None);
        assert_eq!(config.worker().lanes, 16);
        assert_eq!(config.worker().retry.max_attempts, 2);
        assert_eq!(config.store().lock_timeout, Duration::from_millis(75));
        assert_eq!(config.queue_capacity, 1024);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = Config::from_lookup(|key| match key {
            "WORKER_LANES" => Some("many".to_string()),
            "METRICS_PORT" => Some("99999".to_string()),
            _ => None,
        });
        assert_eq!(config.lanes, 4);
        assert_eq!(config.metrics_port, 9000);
    }
}
