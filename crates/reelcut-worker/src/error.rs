//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("No outputs were generated")]
    NothingGenerated,

    #[error("Processing cancelled")]
    Cancelled,

    #[error("Packaging failed: {0}")]
    PackagingFailed(String),

    #[error("Job error: {0}")]
    Job(#[from] reelcut_jobs::JobError),

    #[error("Storage error: {0}")]
    Storage(#[from] reelcut_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] reelcut_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_plan(msg: impl Into<String>) -> Self {
        Self::InvalidPlan(msg.into())
    }

    /// Errors caused by the request rather than by processing.
    pub fn is_input_error(&self) -> bool {
        matches!(self, WorkerError::InvalidPlan(_))
    }
}
