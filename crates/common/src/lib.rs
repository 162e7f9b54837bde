//! Shared types for the score aggregation engine.
//!
//! Identifiers and scores are validated at construction, so anything holding
//! an [`ExamId`], [`StudentId`], [`EventId`] or [`Score`] can rely on it being
//! well-formed.

pub mod error;
pub mod types;

pub use error::ValidationError;
pub use types::{EventId, ExamId, Score, StudentId};
