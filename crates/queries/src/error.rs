//! Query error types.

use thiserror::Error;

/// Errors returned by the query facade.
///
/// Both variants mean "absent"; the HTTP layer maps them to 404.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// No event ever referenced this exam.
    #[error("Exam {0} could not be found")]
    ExamNotFound(String),

    /// No event ever referenced this student.
    #[error("Student {0} could not be found")]
    StudentNotFound(String),
}

impl QueryError {
    /// Returns true for every not-found variant.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            QueryError::ExamNotFound(_) | QueryError::StudentNotFound(_)
        )
    }
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
