use thiserror::Error;

use crate::db::DatabaseError;
use crate::error::{StorageError, WorkerError};
use crate::jobs::JobStoreError;

/// Errors surfaced to API callers. Each variant maps to one error code.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Persistence(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NotFound",
            Self::InvalidState(_) => "InvalidState",
            Self::Validation(_) => "ValidationError",
            Self::Unavailable(_) => "ServiceUnavailable",
            Self::Persistence(_) => "PersistenceError",
            Self::Internal(_) => "InternalError",
        }
    }

    pub(crate) fn analysis_not_found(job_id: &str) -> Self {
        Self::NotFound(format!("Analysis not found: {}", job_id))
    }

    pub(crate) fn deck_not_found(deck_id: i64) -> Self {
        Self::NotFound(format!("Deck not found: {}", deck_id))
    }
}

impl From<JobStoreError> for ServiceError {
    fn from(e: JobStoreError) -> Self {
        match e {
            JobStoreError::NotFound(id) => Self::analysis_not_found(&id),
            JobStoreError::InvalidTransition { .. } => Self::InvalidState(e.to_string()),
            other => {
                tracing::error!("Job store failure: {}", other);
                Self::Persistence(other.to_string())
            }
        }
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(e: DatabaseError) -> Self {
        tracing::error!("Database failure: {}", e);
        Self::Persistence(e.to_string())
    }
}

impl From<WorkerError> for ServiceError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::NoDocuments | WorkerError::MissingLabel => Self::Validation(e.to_string()),
            WorkerError::Storage(StorageError::InvalidFilename(_)) => {
                Self::Validation(e.to_string())
            }
            WorkerError::ShuttingDown => Self::Unavailable(e.to_string()),
            WorkerError::JobStore(inner) => inner.into(),
            WorkerError::Storage(_) => {
                tracing::error!("Upload storage failure: {}", e);
                Self::Persistence(e.to_string())
            }
        }
    }
}
