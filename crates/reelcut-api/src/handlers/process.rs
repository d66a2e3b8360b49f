//! Processing submission.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use reelcut_models::{JobSnapshot, ProcessRequest, SourceVideo, VideoId};
use reelcut_storage::RecordStore;
use reelcut_worker::{download_path, UnitCounts};

use crate::error::ApiResult;
use crate::handlers::videos::load_video;
use crate::services::probe::record_duration;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitBreakdown {
    pub clips: usize,
    pub loops: usize,
    pub stills: usize,
    pub shorts: usize,
}

impl From<UnitCounts> for UnitBreakdown {
    fn from(counts: UnitCounts) -> Self {
        Self {
            clips: counts.clips,
            loops: counts.loops,
            stills: counts.stills,
            shorts: counts.shorts,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub video_id: VideoId,
    pub job: JobSnapshot,
    pub units: UnitBreakdown,
    /// Advisory notes from parsing the cut text
    pub warnings: Vec<String>,
    pub progress_path: String,
    pub download_path: String,
}

/// Validate a request, register its job and start it in the background.
///
/// Everything that can be rejected up front is rejected here: unknown video,
/// malformed cut text, an empty plan, a job already in flight.
pub async fn process_video(
    State(state): State<AppState>,
    Json(request): Json<ProcessRequest>,
) -> ApiResult<(StatusCode, Json<ProcessResponse>)> {
    let video = load_video(&state, request.video_id.as_str()).await?;
    let job = state.engine.prepare(&video, &request).await?;

    if video.duration.is_none() {
        // The job is registered by now; a rejected submission must not leave it processing
        if let Err(e) = record_duration(&state.videos, &video.id, job.duration).await {
            job.handle.fail(format!("Could not record source duration: {}", e));
            return Err(e);
        }
    }

    let response = ProcessResponse {
        video_id: video.id.clone(),
        job: job.handle.snapshot(),
        units: job.counts.into(),
        warnings: job.warnings.clone(),
        progress_path: format!("/api/progress/{}", video.id),
        download_path: download_path(video.id.as_str()),
    };
    info!(video_id = %video.id, total_units = response.job.total_units, "Job accepted");

    let engine = Arc::clone(&state.engine);
    let videos = Arc::clone(&state.videos);
    let video_id = video.id.clone();
    tokio::spawn(async move {
        match engine.execute(job).await {
            Ok(outcome) => {
                info!(video_id = %video_id, artifacts = outcome.artifacts.len(), "Job finished");
                mark_processed(&videos, &video_id).await;
            }
            // The job handle already carries the failure for pollers
            Err(e) => warn!(video_id = %video_id, error = %e, "Job did not complete"),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn mark_processed(videos: &Arc<dyn RecordStore<SourceVideo>>, video_id: &VideoId) {
    let result = async {
        if let Some(mut video) = videos.get(video_id.as_str()).await? {
            video.processed = true;
            videos.update(video_id.as_str(), video).await?;
        }
        Ok::<_, reelcut_storage::StorageError>(())
    }
    .await;
    if let Err(e) = result {
        warn!(video_id = %video_id, error = %e, "Failed to mark video processed");
    }
}
