use async_trait::async_trait;
use common::{ExamId, Score, StudentId};

use crate::Result;

/// Outcome of a successful score upsert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreChange {
    /// The pair had no score before.
    Inserted,
    /// The pair had a score, which was replaced.
    Replaced { previous: Score },
}

/// Write side of the score aggregates.
///
/// Implementations must apply each call atomically: a concurrent reader sees
/// either the state before the call or the state after it, in both views.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Records `score` for the pair, replacing any previous score.
    async fn apply_score(
        &self,
        exam_id: &ExamId,
        student_id: &StudentId,
        score: Score,
    ) -> Result<ScoreChange>;
}
