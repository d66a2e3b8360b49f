//! Background source probing.
//!
//! Every finished upload is probed once so later planning requests can
//! validate cuts against the real duration without waiting on ffprobe.

use std::sync::Arc;

use reelcut_media::Transcoder;
use reelcut_models::{SourceVideo, VideoId};
use reelcut_storage::RecordStore;
use reelcut_worker::JobLogger;

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_probe;
use crate::state::AppState;

/// Probe `video` and store its duration on the catalog record.
///
/// Returns the duration now on record. A duration stored by a concurrent
/// probe is kept.
pub async fn probe_and_record(
    transcoder: &Arc<dyn Transcoder>,
    videos: &Arc<dyn RecordStore<SourceVideo>>,
    video_id: &VideoId,
) -> ApiResult<f64> {
    let Some(video) = videos.get(video_id.as_str()).await? else {
        return Err(ApiError::not_found(format!("Video {} not found", video_id)));
    };
    if let Some(duration) = video.duration {
        return Ok(duration);
    }

    let info = transcoder.probe(&video.path).await?;
    record_duration(videos, video_id, info.duration).await
}

/// Store `duration` unless the record already carries one.
pub async fn record_duration(
    videos: &Arc<dyn RecordStore<SourceVideo>>,
    video_id: &VideoId,
    duration: f64,
) -> ApiResult<f64> {
    let Some(mut video) = videos.get(video_id.as_str()).await? else {
        return Err(ApiError::not_found(format!("Video {} not found", video_id)));
    };
    if !video.set_duration_once(duration) {
        return Ok(video.duration.unwrap_or(duration));
    }
    videos.update(video_id.as_str(), video).await?;
    Ok(duration)
}

/// Fire-and-forget probe after an upload completes.
pub fn spawn_probe(state: &AppState, video_id: VideoId) {
    let transcoder = Arc::clone(state.engine.transcoder());
    let videos = Arc::clone(&state.videos);

    tokio::spawn(async move {
        let logger = JobLogger::new(&video_id, "probe");
        match probe_and_record(&transcoder, &videos, &video_id).await {
            Ok(duration) => {
                logger.log_completion(&format!("duration {:.2}s", duration));
                record_probe("ok");
            }
            Err(e) => {
                logger.log_warning(&format!("probe failed: {}", e));
                record_probe("failed");
            }
        }
    });
}
