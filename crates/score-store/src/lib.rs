//! In-memory aggregate store for exam scores.
//!
//! The store keeps two views of the same facts:
//! - [`ExamRecord`]: per-exam scores with a running sum, count and average
//! - [`StudentRecord`]: per-student scores, one entry per exam
//!
//! Writers go through [`ScoreStore::apply_score`]; readers get snapshot copies
//! that are never mutated after they are returned.

pub mod config;
pub mod error;
pub mod memory;
pub mod record;
pub mod store;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::AggregateStore;
pub use record::{ExamRecord, StudentRecord};
pub use store::{ScoreChange, ScoreStore};
