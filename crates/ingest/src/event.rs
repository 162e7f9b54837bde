//! Score event wire type and its validated form.

use common::{EventId, ExamId, Score, StudentId, ValidationError};
use serde::{Deserialize, Serialize};

fn missing_score() -> f64 {
    f64::NAN
}

/// A score submission as emitted by an event source.
///
/// Fields are kept raw so that malformed events can still be decoded,
/// logged and rejected by [`ScoreEvent::validate`]. Missing identifiers
/// decode as empty strings and a missing score decodes as NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEvent {
    /// The exam the score belongs to.
    #[serde(default)]
    pub exam_id: String,

    /// The student who earned the score.
    #[serde(default)]
    pub student_id: String,

    /// Fraction in [0, 1].
    #[serde(default = "missing_score")]
    pub score: f64,

    /// Idempotency key; unique per submission.
    #[serde(default)]
    pub event_id: String,
}

impl ScoreEvent {
    /// Creates an event with a freshly generated event ID.
    pub fn new(exam_id: impl Into<String>, student_id: impl Into<String>, score: f64) -> Self {
        Self {
            exam_id: exam_id.into(),
            student_id: student_id.into(),
            score,
            event_id: EventId::generate().to_string(),
        }
    }

    /// Replaces the event ID.
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    /// Checks every field and converts to the typed form.
    pub fn validate(&self) -> Result<ValidatedEvent, ValidationError> {
        Ok(ValidatedEvent {
            exam_id: ExamId::new(self.exam_id.as_str())?,
            student_id: StudentId::new(self.student_id.as_str())?,
            score: Score::new(self.score)?,
            event_id: EventId::new(self.event_id.as_str())?,
        })
    }
}

/// A score event whose fields have all passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEvent {
    pub exam_id: ExamId,
    pub student_id: StudentId,
    pub score: Score,
    pub event_id: EventId,
}

impl From<&ValidatedEvent> for ScoreEvent {
    fn from(event: &ValidatedEvent) -> Self {
        Self {
            exam_id: event.exam_id.to_string(),
            student_id: event.student_id.to_string(),
            score: event.score.value(),
            event_id: event.event_id.to_string(),
        }
    }
}

impl TryFrom<&ScoreEvent> for ValidatedEvent {
    type Error = ValidationError;

    fn try_from(event: &ScoreEvent) -> Result<Self, Self::Error> {
        event.validate()
    }
}
