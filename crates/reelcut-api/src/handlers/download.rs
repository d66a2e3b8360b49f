//! Archive download.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use tokio_util::io::ReaderStream;

use reelcut_models::{JobStatus, VideoId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Stream the packaged archive of a completed job.
///
/// The archive is addressed only through the path recorded on the job.
pub async fn download_archive(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Response> {
    let handle = state
        .jobs
        .get(&VideoId::from(video_id.as_str()))
        .ok_or_else(|| ApiError::not_found(format!("No job for video {}", video_id)))?;

    let status = handle.status();
    if status != JobStatus::Completed {
        return Err(ApiError::not_found(format!(
            "Archive for video {} is not available (job is {})",
            video_id,
            status.as_str()
        )));
    }

    let path = handle
        .archive_path()
        .ok_or_else(|| ApiError::internal("Completed job has no archive"))?;
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("Archive has been removed"));
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to open archive: {}", e))),
    };
    let size = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to stat archive: {}", e)))?
        .len();

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("archive.zip")
        .replace('"', "");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}
