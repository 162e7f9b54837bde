//! The query facade.

use common::{ExamId, StudentId};
use score_store::AggregateStore;

use crate::responses::{
    ExamList, ExamResult, ExamResults, ExamSummary, StudentEntry, StudentList, StudentResult,
    StudentResults,
};
use crate::{QueryError, Result};

/// Read-only access to the score aggregates.
///
/// Every method works on a snapshot copied out of the store, so a response
/// never changes after it is returned and readers never wait for the next
/// event. Output lists are sorted by ID.
#[derive(Clone)]
pub struct QueryFacade {
    store: AggregateStore,
}

impl QueryFacade {
    /// Creates a facade reading from `store`.
    pub fn new(store: AggregateStore) -> Self {
        Self { store }
    }

    /// Lists every exam with its average score and student count.
    pub async fn list_exams(&self) -> ExamList {
        let exams = self
            .store
            .get_all_exams()
            .await
            .into_iter()
            .map(|(exam_id, record)| ExamSummary {
                exam_id,
                average_score: record.average(),
                student_count: record.scores().len(),
            })
            .collect();
        ExamList { exams }
    }

    /// Returns every student's score on the exam, plus the exam average.
    #[tracing::instrument(skip(self))]
    pub async fn get_exam(&self, exam_id: &str) -> Result<ExamResults> {
        let not_found = || QueryError::ExamNotFound(exam_id.to_string());
        let id = ExamId::new(exam_id).map_err(|_| not_found())?;
        let record = self.store.get_exam(&id).await.ok_or_else(not_found)?;

        let mut exam_results: Vec<_> = record
            .scores()
            .iter()
            .map(|(student_id, score)| StudentResult {
                student_id: student_id.clone(),
                score: score.value(),
            })
            .collect();
        exam_results.sort_by(|a, b| a.student_id.cmp(&b.student_id));

        Ok(ExamResults {
            exam_results,
            average: record.average(),
        })
    }

    /// Lists every known student.
    pub async fn list_students(&self) -> StudentList {
        let students = self
            .store
            .get_all_students()
            .await
            .into_iter()
            .map(|student_id| StudentEntry { student_id })
            .collect();
        StudentList { students }
    }

    /// Returns the student's score on every exam, plus their average.
    #[tracing::instrument(skip(self))]
    pub async fn get_student(&self, student_id: &str) -> Result<StudentResults> {
        let not_found = || QueryError::StudentNotFound(student_id.to_string());
        let id = StudentId::new(student_id).map_err(|_| not_found())?;
        let record = self.store.get_student(&id).await.ok_or_else(not_found)?;

        let mut student_results: Vec<_> = record
            .exams()
            .iter()
            .map(|(exam_id, score)| ExamResult {
                exam_id: exam_id.clone(),
                score: score.value(),
            })
            .collect();
        student_results.sort_by(|a, b| a.exam_id.cmp(&b.exam_id));

        Ok(StudentResults {
            student_results,
            average: record.average(),
        })
    }
}
