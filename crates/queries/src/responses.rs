//! Response shapes returned by the query facade.
//!
//! Scores and averages are fractions in [0, 1]; consumers scale for display.

use common::{ExamId, StudentId};
use serde::Serialize;

/// One row of the exam list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSummary {
    pub exam_id: ExamId,
    pub average_score: f64,
    pub student_count: usize,
}

/// Every known exam with its average.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExamList {
    pub exams: Vec<ExamSummary>,
}

/// One student's score on an exam.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResult {
    pub student_id: StudentId,
    pub score: f64,
}

/// All scores recorded for one exam.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResults {
    pub exam_results: Vec<StudentResult>,
    pub average: f64,
}

/// One entry of the student list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentEntry {
    pub student_id: StudentId,
}

/// Every known student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentList {
    pub students: Vec<StudentEntry>,
}

/// A student's score on one exam.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamResult {
    pub exam_id: ExamId,
    pub score: f64,
}

/// All scores recorded for one student.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentResults {
    pub student_results: Vec<ExamResult>,
    pub average: f64,
}
