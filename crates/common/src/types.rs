use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ValidationError;

fn non_empty(field: &'static str, value: String) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::EmptyField { field })
    } else {
        Ok(value)
    }
}

/// Identifier of an exam.
///
/// Never empty: construction goes through [`ExamId::new`], which rejects
/// blank strings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExamId(String);

impl ExamId {
    /// Creates an exam ID, rejecting empty or blank input.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty("examId", id.into()).map(Self)
    }

    /// Returns the exam ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ExamId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ExamId> for String {
    fn from(id: ExamId) -> Self {
        id.0
    }
}

impl AsRef<str> for ExamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a student.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StudentId(String);

impl StudentId {
    /// Creates a student ID, rejecting empty or blank input.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty("studentId", id.into()).map(Self)
    }

    /// Returns the student ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StudentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for StudentId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<StudentId> for String {
    fn from(id: StudentId) -> Self {
        id.0
    }
}

impl AsRef<str> for StudentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Idempotency key of a score event.
///
/// Event sources assign these; [`EventId::generate`] exists for producers
/// that have no natural key of their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId(String);

impl EventId {
    /// Creates an event ID, rejecting empty or blank input.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        non_empty("eventId", id.into()).map(Self)
    }

    /// Creates a fresh random event ID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the event ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for EventId {
    type Error = ValidationError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0
    }
}

/// A score expressed as a fraction in the inclusive range [0, 1].
///
/// Display layers scale by 100 for percentages; the engine never does.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Score(f64);

impl Score {
    /// The lowest possible score.
    pub const MIN: Score = Score(0.0);

    /// The highest possible score.
    pub const MAX: Score = Score(1.0);

    /// Creates a score, rejecting NaN, infinities and values outside [0, 1].
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NonFiniteScore(value));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::ScoreOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Returns the raw fraction.
    pub fn value(&self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<f64> for Score {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> Self {
        score.0
    }
}
