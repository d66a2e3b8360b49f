//! Upload handlers: whole-file multipart uploads and chunked sessions.

use axum::body::Body;
use axum::extract::{Multipart, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use reelcut_models::SourceVideo;
use reelcut_storage::ChunkReceipt;

use crate::error::{ApiError, ApiResult};
use crate::services::probe::spawn_probe;
use crate::state::AppState;

/// Multipart field carrying the file.
const VIDEO_FIELD: &str = "video";

/// Whole-file upload.
///
/// The request's `Content-Length` is the declared size for the free-space
/// check. Without one, the upload limit stands in for it.
pub async fn upload_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SourceVideo>)> {
    let declared_size = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(state.config.max_upload_size as u64);

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }
        let original_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Video field must carry a file name"))?;

        let video = state.uploads.store_upload(&original_name, declared_size, field).await?;
        let video = register(&state, video).await?;
        return Ok((StatusCode::CREATED, Json(video)));
    }

    Err(ApiError::bad_request("No video file uploaded"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkQuery {
    pub upload_id: String,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub file_name: String,
}

/// Store one chunk. The raw request body is the chunk payload.
pub async fn upload_chunk(
    State(state): State<AppState>,
    Query(query): Query<ChunkQuery>,
    body: Body,
) -> ApiResult<Json<ChunkReceipt>> {
    let receipt = state
        .uploads
        .write_chunk(
            &query.upload_id,
            query.chunk_index,
            query.total_chunks,
            &query.file_name,
            body.into_data_stream(),
        )
        .await?;
    Ok(Json(receipt))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub upload_id: String,
    pub file_name: String,
    #[serde(default)]
    pub total_size: Option<u64>,
}

/// Assemble a chunked upload into a source video.
pub async fn finalize_upload(
    State(state): State<AppState>,
    Json(request): Json<FinalizeRequest>,
) -> ApiResult<(StatusCode, Json<SourceVideo>)> {
    let video = state
        .uploads
        .finalize(&request.upload_id, &request.file_name, request.total_size)
        .await?;
    let video = register(&state, video).await?;
    Ok((StatusCode::CREATED, Json(video)))
}

/// Add the video to the catalog and start probing it.
async fn register(state: &AppState, video: SourceVideo) -> ApiResult<SourceVideo> {
    state.videos.create(video.id.as_str(), video.clone()).await?;
    info!(video_id = %video.id, size = video.size, original_name = %video.original_name, "Video uploaded");
    spawn_probe(state, video.id.clone());
    Ok(video)
}
