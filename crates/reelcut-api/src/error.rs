//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use reelcut_jobs::JobError;
use reelcut_media::MediaError;
use reelcut_models::RandomCutError;
use reelcut_storage::StorageError;
use reelcut_worker::WorkerError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    RandomCut(#[from] RandomCutError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::RandomCut(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Storage(e) => storage_status(e),
            ApiError::Job(e) => job_status(e),
            ApiError::Worker(e) => match e {
                WorkerError::InvalidPlan(_) => StatusCode::BAD_REQUEST,
                WorkerError::Job(e) => job_status(e),
                WorkerError::Storage(e) => storage_status(e),
                WorkerError::Media(e) => media_status(e),
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Media(e) => media_status(e),
        }
    }
}

fn storage_status(e: &StorageError) -> StatusCode {
    match e {
        StorageError::SessionNotFound(_) | StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::FinalizeInProgress(_) | StorageError::AlreadyExists(_) => StatusCode::CONFLICT,
        StorageError::InsufficientDiskSpace { .. } => StatusCode::INSUFFICIENT_STORAGE,
        StorageError::MissingChunk(_) => StatusCode::BAD_REQUEST,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn job_status(e: &JobError) -> StatusCode {
    match e {
        JobError::AlreadyRunning(_) => StatusCode::CONFLICT,
        JobError::NotFound(_) => StatusCode::NOT_FOUND,
    }
}

fn media_status(e: &MediaError) -> StatusCode {
    match e {
        MediaError::FileNotFound(_) => StatusCode::NOT_FOUND,
        MediaError::InvalidVideo(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                "An internal error occurred".to_string()
            } else {
                self.to_string()
            }
        } else {
            self.to_string()
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcut_models::VideoId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(StorageError::SessionNotFound("u".into())), StatusCode::NOT_FOUND),
            (ApiError::from(StorageError::FinalizeInProgress("u".into())), StatusCode::CONFLICT),
            (
                ApiError::from(StorageError::IncompleteUpload { received: 1, expected: 3 }),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::from(StorageError::InsufficientDiskSpace { required: 10, available: 1 }),
                StatusCode::INSUFFICIENT_STORAGE,
            ),
            (ApiError::from(JobError::AlreadyRunning(VideoId::from("v"))), StatusCode::CONFLICT),
            (
                ApiError::from(WorkerError::Job(JobError::NotFound(VideoId::from("v")))),
                StatusCode::NOT_FOUND,
            ),
            (ApiError::from(WorkerError::invalid_plan("bad")), StatusCode::BAD_REQUEST),
            (ApiError::from(WorkerError::NothingGenerated), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ApiError::from(RandomCutError::InsufficientDuration { duration: 10.0, required: 13.0 }),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected, "{}", err);
        }
    }

    #[test]
    fn test_transparent_detail() {
        let err = ApiError::from(StorageError::IncompleteUpload { received: 2, expected: 5 });
        assert_eq!(err.to_string(), "Upload incomplete: received 2 of 5 chunks");
    }
}
