//! Exam and student records held by the store.

use std::collections::HashMap;

use common::{ExamId, Score, StudentId};
use serde::Serialize;

use crate::store::ScoreChange;

/// Per-exam aggregate: current score per student plus running totals.
///
/// `sum` and `count` are maintained incrementally so the average never
/// requires a rescan of `scores`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExamRecord {
    scores: HashMap<StudentId, Score>,
    sum: f64,
    count: u64,
    average: f64,
}

impl ExamRecord {
    /// Creates an exam record with no scores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current score per student.
    pub fn scores(&self) -> &HashMap<StudentId, Score> {
        &self.scores
    }

    /// Returns the score recorded for `student_id`, if any.
    pub fn score_for(&self, student_id: &StudentId) -> Option<Score> {
        self.scores.get(student_id).copied()
    }

    /// Running sum of all current scores.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Number of students with a score. Always equals `scores().len()`.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the current scores, or 0 when there are none.
    pub fn average(&self) -> f64 {
        self.average
    }

    /// Returns true if no student has a score on this exam.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Upserts a student's score and updates the running totals.
    pub(crate) fn upsert(&mut self, student_id: StudentId, score: Score) -> ScoreChange {
        let change = match self.scores.insert(student_id, score) {
            Some(previous) => {
                self.sum -= previous.value();
                ScoreChange::Replaced { previous }
            }
            None => {
                self.count += 1;
                ScoreChange::Inserted
            }
        };
        self.sum += score.value();
        self.recompute_average();
        change
    }

    fn recompute_average(&mut self) {
        self.average = if self.count == 0 {
            0.0
        } else {
            // subtraction on replace can drift a hair outside the valid range
            (self.sum / self.count as f64).clamp(0.0, 1.0)
        };
    }
}

/// Per-student view: the student's current score on each exam.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StudentRecord {
    exams: HashMap<ExamId, Score>,
}

impl StudentRecord {
    /// Creates a student record with no scores.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current score per exam.
    pub fn exams(&self) -> &HashMap<ExamId, Score> {
        &self.exams
    }

    /// Returns the score recorded on `exam_id`, if any.
    pub fn score_for(&self, exam_id: &ExamId) -> Option<Score> {
        self.exams.get(exam_id).copied()
    }

    /// Mean of the student's scores across exams, or 0 when there are none.
    pub fn average(&self) -> f64 {
        if self.exams.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.exams.values().map(Score::value).sum();
        sum / self.exams.len() as f64
    }

    /// Returns true if the student has no score on any exam.
    pub fn is_empty(&self) -> bool {
        self.exams.is_empty()
    }

    pub(crate) fn set(&mut self, exam_id: ExamId, score: Score) {
        self.exams.insert(exam_id, score);
    }

    pub(crate) fn into_exams(self) -> HashMap<ExamId, Score> {
        self.exams
    }
}
