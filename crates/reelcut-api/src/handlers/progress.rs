//! Job progress polling and cancellation.

use axum::extract::{Path, State};
use axum::Json;

use reelcut_models::{JobSnapshot, VideoId};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Current snapshot of the job for a video.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    state
        .jobs
        .snapshot(&VideoId::from(video_id.as_str()))
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No job for video {}", video_id)))
}

/// Request cancellation. Repeating it, or cancelling a finished job, just
/// returns the current snapshot.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let snapshot = state.jobs.cancel(&VideoId::from(video_id))?;
    Ok(Json(snapshot))
}
