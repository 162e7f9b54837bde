//! Score aggregation process wiring.
//!
//! Builds the store, worker and query facade from [`Config`], runs the worker
//! against an event source until it is exhausted or a shutdown is requested,
//! and reports the resulting aggregates through tracing.

pub mod config;
pub mod error;

use std::future::Future;

use ingest::{DeadLetterLog, EventSource, ScoreEventWorker, WorkerStats};
use queries::QueryFacade;
use score_store::AggregateStore;

pub use config::Config;
pub use error::AppError;

/// The assembled engine: one store shared by the worker and the read side.
pub struct Engine {
    store: AggregateStore,
    worker: ScoreEventWorker<AggregateStore>,
    queries: QueryFacade,
}

impl Engine {
    /// Creates an engine with an empty store.
    pub fn new(config: &Config) -> Self {
        let store = AggregateStore::with_config(config.store());
        let worker = ScoreEventWorker::new(store.clone(), config.worker());
        let queries = QueryFacade::new(store.clone());
        Self {
            store,
            worker,
            queries,
        }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &AggregateStore {
        &self.store
    }

    /// Returns the read-only query facade.
    pub fn queries(&self) -> &QueryFacade {
        &self.queries
    }

    /// Returns the dead-letter log.
    pub fn dead_letters(&self) -> DeadLetterLog {
        self.worker.dead_letters()
    }

    /// Consumes `source` until it is exhausted or `shutdown` resolves.
    ///
    /// On shutdown the worker stops pulling new events and finishes the ones
    /// it already accepted before this returns.
    pub async fn run<E, F>(&self, source: E, shutdown: F) -> Result<WorkerStats, AppError>
    where
        E: EventSource + 'static,
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.worker.start(source);
        let stop = handle.stop_signal();
        let watcher = tokio::spawn(async move {
            shutdown.await;
            stop.stop();
        });

        let stats = handle.join().await;
        watcher.abort();
        Ok(stats?)
    }

    /// Logs one line per exam plus totals.
    pub async fn log_summary(&self) {
        let exams = self.queries.list_exams().await;
        for exam in &exams.exams {
            tracing::info!(
                exam_id = %exam.exam_id,
                average_score = exam.average_score,
                student_count = exam.student_count,
                "exam summary"
            );
        }

        let students = self.queries.list_students().await;
        let dead_letters = self.dead_letters().len().await;
        tracing::info!(
            exams = exams.exams.len(),
            students = students.students.len(),
            dead_letters,
            "aggregate summary"
        );
    }
}

/// Registers descriptions for the metrics emitted by the ingestion pipeline.
pub fn describe_metrics() {
    metrics::describe_counter!(
        "score_events_received_total",
        "Score events pulled from the source"
    );
    metrics::describe_counter!(
        "score_events_applied_total",
        "Score events applied to the aggregates"
    );
    metrics::describe_counter!(
        "score_events_duplicate_total",
        "Score events skipped because their event ID was already seen"
    );
    metrics::describe_counter!(
        "score_events_rejected_total",
        "Score events dropped as invalid or malformed"
    );
    metrics::describe_counter!(
        "score_events_dead_lettered_total",
        "Score events moved to the dead-letter log after exhausting retries"
    );
    metrics::describe_counter!(
        "score_apply_retries_total",
        "Retried store writes after a transient failure"
    );
    metrics::describe_histogram!(
        "score_apply_duration_seconds",
        metrics::Unit::Seconds,
        "Time to apply one score event, including retries"
    );
}
