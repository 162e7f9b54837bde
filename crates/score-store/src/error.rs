//! Store error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while mutating the aggregate store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// A shard lock could not be acquired in time. Nothing was mutated.
    #[error("Timed out after {timeout:?} waiting for {resource} lock on {key}")]
    LockTimeout {
        resource: &'static str,
        key: String,
        timeout: Duration,
    },
}

impl StoreError {
    /// Returns true if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::LockTimeout { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
