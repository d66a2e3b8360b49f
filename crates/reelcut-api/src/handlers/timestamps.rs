//! Planning handlers: validate cut text and generate random cuts.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use reelcut_models::{
    generate_random_cuts, parse_time_ranges, render_time_ranges, TimeRange, TimeRangeParseResult,
    VideoId,
};

use crate::error::ApiResult;
use crate::handlers::videos::load_video;
use crate::services::probe::probe_and_record;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub text: String,
    /// Validate against this video's duration when known
    #[serde(default)]
    pub video_id: Option<VideoId>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    #[serde(flatten)]
    pub result: TimeRangeParseResult,
    /// Accepted ranges rendered back as cut text
    pub text: String,
}

/// Parse cut text without committing to processing.
///
/// Unknown durations skip the end-of-video check; the text is never rejected
/// as a whole here, every candidate line gets its own verdict.
pub async fn validate_timestamps(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<Json<ValidateResponse>> {
    let duration = match &request.video_id {
        Some(id) => load_video(&state, id.as_str()).await?.duration,
        None => None,
    };

    let result = parse_time_ranges(&request.text, duration);
    let text = render_time_ranges(&result.valid);
    Ok(Json(ValidateResponse { result, text }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub video_id: VideoId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub video_id: VideoId,
    pub duration: f64,
    pub ranges: Vec<TimeRange>,
    pub text: String,
}

/// Lay out random cuts across a video, probing it first if needed.
pub async fn generate_timestamps(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let video = load_video(&state, request.video_id.as_str()).await?;
    let duration = match video.duration {
        Some(d) => d,
        None => probe_and_record(state.engine.transcoder(), &state.videos, &video.id).await?,
    };

    let ranges = generate_random_cuts(duration)?;
    let text = render_time_ranges(&ranges);
    Ok(Json(GenerateResponse {
        video_id: video.id,
        duration,
        ranges,
        text,
    }))
}
