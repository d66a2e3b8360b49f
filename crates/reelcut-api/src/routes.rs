//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    cancel_job, download_archive, finalize_upload, generate_timestamps, get_progress, get_video,
    health, process_video, ready, upload_chunk, upload_video, validate_timestamps,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // Upload bodies are streamed to disk, so they get their own, larger cap
    let upload_routes = Router::new()
        .route("/upload", post(upload_video))
        .route("/upload/chunk", post(upload_chunk))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_upload_size));

    let api_routes = Router::new()
        .route("/upload/finalize", post(finalize_upload))
        .route("/videos/:video_id", get(get_video))
        .route("/timestamps/validate", post(validate_timestamps))
        .route("/timestamps/generate", post(generate_timestamps))
        .route("/process", post(process_video))
        .route("/progress/:video_id", get(get_progress))
        .route("/progress/:video_id/cancel", post(cancel_job))
        .route("/download/:video_id", get(download_archive))
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", upload_routes.merge(api_routes))
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
