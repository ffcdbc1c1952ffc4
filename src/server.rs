//! Axum router construction.
//!
//! The [`app`] function wires the infrastructure endpoints (`/health`,
//! `/metrics`) and sends every other route, any method and any depth,
//! through the gateway's redirect handler.

use axum::{
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::errors::generate_request_id;
use crate::handlers;
use crate::metrics::{metrics_handler, metrics_middleware};
use crate::AppState;

/// Build the axum [`Router`] with all gateway routes.
///
/// The returned router is ready to be passed to `axum::serve`.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint.
        .route("/health", get(health_check))
        // Prometheus metrics endpoint.
        .route("/metrics", get(metrics_handler))
        // Everything else is a gateway request: any method, any depth.
        .fallback(handlers::redirect::handle_request)
        // Application state shared across all handlers.
        .with_state(state)
        // Layer ordering: inner layers run first, outer layers wrap them.
        .layer(middleware::from_fn(common_headers_middleware))
        .layer(TraceLayer::new_for_http())
        // metrics_middleware is outermost (captures full request lifecycle).
        .layer(middleware::from_fn(metrics_middleware))
}

// -- Common headers middleware -----------------------------------------------

/// Tower middleware that adds common response headers to every response:
/// - `x-request-id`: 16-character uppercase hex string
/// - `Date`: RFC 7231 formatted timestamp
/// - `Server`: `BlobGate`
async fn common_headers_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    if !headers.contains_key("x-request-id") {
        let request_id = generate_request_id();
        headers.insert("x-request-id", HeaderValue::from_str(&request_id).unwrap());
    }

    let date = httpdate::fmt_http_date(std::time::SystemTime::now());
    headers.insert("date", HeaderValue::from_str(&date).unwrap());
    headers.insert("server", HeaderValue::from_static("BlobGate"));

    response
}

// -- Health check ------------------------------------------------------------

/// `GET /health` -- Returns `{"status": "ok"}` with 200 OK.
async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "application/json")],
        r#"{"status":"ok"}"#,
    )
}

// -- Tests --------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{header, Method};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let state = Arc::new(AppState::new(Config::default()).unwrap());
        app(state)
    }

    async fn send(router: Router, method: Method, uri: &str) -> Response {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        router.oneshot(req).await.unwrap()
    }

    async fn body_text(resp: Response) -> String {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let resp = send(test_app(), Method::GET, "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_common_headers_present() {
        let resp = send(test_app(), Method::GET, "/health").await;
        assert_eq!(resp.headers().get("server").unwrap(), "BlobGate");
        assert!(resp.headers().contains_key("x-request-id"));
        assert!(resp.headers().contains_key("date"));
    }

    #[tokio::test]
    async fn test_missing_segments_is_bad_request() {
        let resp = send(test_app(), Method::GET, "/acct/sh").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_text(resp).await;
        assert_eq!(body, "Missing container in path(/acct/sh)");
    }

    #[tokio::test]
    async fn test_missing_all_segments_names_each() {
        let resp = send(test_app(), Method::GET, "/").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_text(resp).await;
        assert!(body.contains("account/share/container"));
    }

    #[tokio::test]
    async fn test_empty_object_path_redirects_to_file_share() {
        let resp = send(test_app(), Method::GET, "/acct/sh/ct?sv=abc").await;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "https://acct.file.core.windows.net/sh?sv=abc"
        );
    }

    #[tokio::test]
    async fn test_empty_object_path_redirects_regardless_of_method() {
        for method in [Method::PUT, Method::DELETE, Method::HEAD, Method::POST] {
            let resp = send(test_app(), method, "/acct/sh/ct").await;
            assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
            assert_eq!(
                resp.headers().get(header::LOCATION).unwrap(),
                "https://acct.file.core.windows.net/sh"
            );
        }
    }

    #[tokio::test]
    async fn test_non_get_redirects_without_probe() {
        // A PUT with an object path must go straight to the file share;
        // no blob probe is issued (the default upstream hosts are not
        // resolvable from tests, so reaching them would fail loudly).
        let resp = send(test_app(), Method::PUT, "/acct/sh/ct/dir/file.bin?sv=abc").await;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "https://acct.file.core.windows.net/sh/dir/file.bin?sv=abc"
        );
    }

    #[tokio::test]
    async fn test_management_query_params_redirect_without_probe() {
        for query in ["comp=list", "restype=container", "sv=1&comp=blocklist"] {
            let uri = format!("/acct/sh/ct/dir/file.bin?{query}");
            let resp = send(test_app(), Method::GET, &uri).await;
            assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
            assert_eq!(
                resp.headers().get(header::LOCATION).unwrap().to_str().unwrap(),
                format!("https://acct.file.core.windows.net/sh/dir/file.bin?{query}")
            );
        }
    }

    #[tokio::test]
    async fn test_redirects_have_no_body() {
        let resp = send(test_app(), Method::GET, "/acct/sh/ct").await;
        assert_eq!(body_text(resp).await, "");
    }

    #[tokio::test]
    async fn test_configured_redirect_status() {
        let mut config = Config::default();
        config.gateway.redirect_status = 302;
        let state = Arc::new(AppState::new(config).unwrap());
        let resp = send(app(state), Method::GET, "/acct/sh/ct").await;
        assert_eq!(resp.status(), StatusCode::FOUND);
    }
}
