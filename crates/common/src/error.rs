//! Validation error shared by every crate that accepts raw input.

use thiserror::Error;

/// A raw value failed validation and cannot enter the engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required identifier was empty or blank.
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    /// The score was NaN or infinite.
    #[error("score must be a finite number, got {0}")]
    NonFiniteScore(f64),

    /// The score was outside the inclusive range [0, 1].
    #[error("score must be within [0, 1], got {0}")]
    ScoreOutOfRange(f64),
}
