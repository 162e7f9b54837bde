//! Read side of the score aggregation engine.
//!
//! [`QueryFacade`] exposes the four reads consumed by the HTTP layer:
//! list exams, one exam, list students, one student. Responses are
//! serializable snapshots with the field names that layer returns as JSON.

pub mod error;
pub mod facade;
pub mod responses;

pub use error::{QueryError, Result};
pub use facade::QueryFacade;
pub use responses::{
    ExamList, ExamResult, ExamResults, ExamSummary, StudentEntry, StudentList, StudentResult,
    StudentResults,
};
