//! Worker error types.

use thiserror::Error;

/// Errors surfaced when stopping or joining a worker.
///
/// Per-event failures never appear here: invalid events are dropped and
/// exhausted ones are dead-lettered.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A dispatcher or lane task panicked or was aborted.
    #[error("Worker task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Result type for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
