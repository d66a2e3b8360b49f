//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload session not found: {0}")]
    SessionNotFound(String),

    #[error("Upload incomplete: received {received} of {expected} chunks")]
    IncompleteUpload { received: u32, expected: u32 },

    #[error("Upload {0} is already being finalized")]
    FinalizeInProgress(String),

    #[error("Chunk {0} is missing from the staging area")]
    MissingChunk(u32),

    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    #[error("Invalid upload id: {0}")]
    InvalidUploadId(String),

    #[error("Assembled size {actual} does not match declared size {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Insufficient disk space: {required} bytes required, {available} available")]
    InsufficientDiskSpace { required: u64, available: u64 },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Nothing to package")]
    NothingToPackage,

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound(key.into())
    }

    pub fn invalid_chunk(msg: impl Into<String>) -> Self {
        Self::InvalidChunk(msg.into())
    }

    /// Caller mistakes, as opposed to server-side failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StorageError::IncompleteUpload { .. }
                | StorageError::InvalidChunk(_)
                | StorageError::InvalidUploadId(_)
                | StorageError::SizeMismatch { .. }
        )
    }
}
