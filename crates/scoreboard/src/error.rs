//! Process-level error types.

use thiserror::Error;

/// Errors that can abort the scoreboard process at startup or shutdown.
#[derive(Debug, Error)]
pub enum AppError {
    /// The Prometheus exporter could not be installed.
    #[error("Metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// The tracing subscriber could not be installed.
    #[error("Logging setup error: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    /// The worker failed while running or stopping.
    #[error("Worker error: {0}")]
    Worker(#[from] ingest::WorkerError),
}
