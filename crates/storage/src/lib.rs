//! Storage Layer
//!
//! In-memory audit trail of evaluations with bounded retention.

mod repository;

pub use repository::{EvaluationRecord, Repository, StorageConfig};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
}
