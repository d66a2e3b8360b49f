//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

/// Install the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "reelcut_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "reelcut_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "reelcut_http_requests_in_flight";
    pub const PROBES_TOTAL: &str = "reelcut_probes_total";
    pub const JANITOR_RECLAIMED_TOTAL: &str = "reelcut_janitor_reclaimed_total";
}

static VIDEO_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/api/(videos|progress|download)/[^/]+").expect("valid video segment regex")
});

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a background probe outcome.
pub fn record_probe(outcome: &'static str) {
    counter!(names::PROBES_TOTAL, "outcome" => outcome).increment(1);
}

/// Record items removed by one janitor sweep.
pub fn record_janitor_reclaimed(kind: &'static str, count: usize) {
    counter!(names::JANITOR_RECLAIMED_TOTAL, "kind" => kind).increment(count as u64);
}

/// Collapse per-video path segments so labels stay low-cardinality.
fn sanitize_path(path: &str) -> String {
    VIDEO_SEGMENT.replace(path, "/api/$1/:video_id").into_owned()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    record_http_request(&method, &path, status, start.elapsed().as_secs_f64());

    response
}
