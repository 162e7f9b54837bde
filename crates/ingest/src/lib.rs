//! Score event ingestion.
//!
//! This crate turns a stream of raw [`ScoreEvent`]s into store mutations:
//! - [`EventSource`] trait with channel, iterator, stream and JSON-lines sources
//! - [`ScoreEventWorker`] validating, deduplicating and applying events
//! - [`RetryPolicy`] bounding retries of transient store failures
//! - [`DeadLetterLog`] holding events that exhausted their retries
//!
//! Events for the same exam are applied in arrival order; events for
//! different exams may be applied in parallel.

pub mod config;
pub mod dead_letter;
pub mod error;
pub mod event;
pub mod idempotency;
pub mod retry;
pub mod source;
pub mod worker;

pub use config::WorkerConfig;
pub use dead_letter::{DeadLetter, DeadLetterLog};
pub use error::{Result, WorkerError};
pub use event::{ScoreEvent, ValidatedEvent};
pub use idempotency::IdempotencyCache;
pub use retry::RetryPolicy;
pub use source::{
    ChannelEventSource, EventSource, IterEventSource, JsonLinesEventSource, StreamEventSource,
};
pub use worker::{ScoreEventWorker, StopSignal, WorkerHandle, WorkerStats};
