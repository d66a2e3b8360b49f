//! Video catalog handlers.

use axum::extract::{Path, State};
use axum::Json;

use reelcut_models::SourceVideo;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Look up a catalog record or fail with 404.
pub async fn load_video(state: &AppState, video_id: &str) -> ApiResult<SourceVideo> {
    state
        .videos
        .get(video_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Video {} not found", video_id)))
}

/// Get a video's catalog record.
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<SourceVideo>> {
    Ok(Json(load_video(&state, &video_id).await?))
}
