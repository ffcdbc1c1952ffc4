//! Prometheus metrics for BlobGate.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides a Tower-compatible middleware for
//! HTTP RED metrics, and exposes the `/metrics` endpoint handler.

use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, path, status.
pub const HTTP_REQUESTS_TOTAL: &str = "blobgate_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method, path.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "blobgate_http_request_duration_seconds";

/// Total redirects issued (counter). Labels: target (`file` | `blob`).
pub const REDIRECTS_TOTAL: &str = "blobgate_redirects_total";

/// Total block-list commits issued on behalf of readers (counter).
pub const BLOCK_COMMITS_TOTAL: &str = "blobgate_block_commits_total";

/// Total probes that returned an absent or unrecognized state header
/// (counter). These fail open to the file-share redirect; the counter is
/// the only signal that it is happening.
pub const UNKNOWN_STATE_TOTAL: &str = "blobgate_unknown_blob_state_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder. Idempotent -- safe to call
/// multiple times (e.g. in tests). Returns a reference to the global handle.
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    })
}

/// Register metric descriptions with the global recorder. Call once after
/// `init_metrics()`.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(REDIRECTS_TOTAL, "Total redirects issued by target");
    describe_counter!(BLOCK_COMMITS_TOTAL, "Total block-list commits issued");
    describe_counter!(
        UNKNOWN_STATE_TOTAL,
        "Total probes with absent or unrecognized blob state"
    );
}

// -- Metrics middleware -------------------------------------------------------

/// Axum middleware that records HTTP RED metrics for every request.
///
/// Excludes `/metrics` from self-instrumentation to avoid feedback loops.
/// Must be the outermost layer so it captures the full request lifecycle.
pub async fn metrics_middleware(
    req: Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Response {
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    // Do not instrument the metrics endpoint itself.
    if req.uri().path() == "/metrics" {
        return next.run(req).await;
    }

    let start = Instant::now();
    let response = next.run(req).await;
    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "path" => path.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method, "path" => path).record(duration);

    response
}

// -- Path normalization -------------------------------------------------------

/// Normalize an actual request path to a route template for metric labels.
///
/// This prevents high-cardinality labels from unique account/object names.
///
/// Examples:
/// - `/health` -> `/health`
/// - `/acct` -> `/{account}`
/// - `/acct/sh/ct` -> `/{account}/{share}/{container}`
/// - `/acct/sh/ct/dir/file.bin` -> `/{account}/{share}/{container}/{object}`
fn normalize_path(path: &str) -> String {
    match path {
        "/" | "/health" | "/metrics" => path.to_string(),
        _ => {
            let segments = path.split('/').filter(|s| !s.is_empty()).count();
            match segments {
                0 => "/".to_string(),
                1 => "/{account}".to_string(),
                2 => "/{account}/{share}".to_string(),
                3 => "/{account}/{share}/{container}".to_string(),
                _ => "/{account}/{share}/{container}/{object}".to_string(),
            }
        }
    }
}

// -- Metrics endpoint handler -------------------------------------------------

/// `GET /metrics` -- Render Prometheus exposition format text.
pub async fn metrics_handler() -> impl IntoResponse {
    let handle = PROMETHEUS_HANDLE
        .get()
        .expect("Prometheus recorder not initialized");
    let body = handle.render();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_infrastructure() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn test_normalize_path_partial() {
        assert_eq!(normalize_path("/acct"), "/{account}");
        assert_eq!(normalize_path("/acct/sh"), "/{account}/{share}");
        assert_eq!(normalize_path("/acct/sh/ct"), "/{account}/{share}/{container}");
    }

    #[test]
    fn test_normalize_path_object() {
        assert_eq!(
            normalize_path("/acct/sh/ct/file.bin"),
            "/{account}/{share}/{container}/{object}"
        );
        assert_eq!(
            normalize_path("/acct/sh/ct/deep/dir/file.bin"),
            "/{account}/{share}/{container}/{object}"
        );
    }
}
