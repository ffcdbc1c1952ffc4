//! The redirection/reconciliation decision engine.
//!
//! Evaluated in order, first match wins:
//!
//! 1. Fewer than three path segments -> 400.
//! 2. No object path below the container -> redirect to the file share.
//! 3. Non-GET method, or a `comp`/`restype` query parameter (storage
//!    management operations) -> redirect to the file share, no probe.
//! 4. Probe the blob endpoint and branch on its commit state, lazily
//!    committing uncommitted block blobs before redirecting to them.
//!
//! Each request is an independent, stateless chain of at most three
//! outbound calls (HEAD, then optionally GET + PUT). No retries, no
//! caching, no coordination between concurrent requests for the same
//! object: duplicate commits are resolved by the storage service's
//! last-write-wins semantics.

use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::blocklist::{commit_block_list, fetch_uncommitted_blocks};
use crate::context::{RequestContext, UpstreamUrls};
use crate::errors::GatewayError;
use crate::metrics::{BLOCK_COMMITS_TOTAL, REDIRECTS_TOTAL, UNKNOWN_STATE_TOTAL};
use crate::probe::{probe_blob_state, BlobState};
use crate::AppState;

/// Fallback handler for every non-infrastructure route.
pub async fn handle_request(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
) -> Result<Response, GatewayError> {
    let ctx = RequestContext::from_parts(uri.path(), uri.query())?;
    let urls = UpstreamUrls::build(&ctx, &state.config.gateway);
    let redirect_status = state.config.gateway.redirect_status_code();

    // Without an object path there is nothing to probe on the blob side.
    if !ctx.has_object_path() {
        debug!("No object path, redirecting to file share: {}", urls.file_url);
        return redirect_to(redirect_status, &urls.file_url, "file");
    }

    // Only simple GETs participate in the commit-on-read optimization.
    // Everything else goes to the always-consistent file-share path.
    let params = ctx.query_params();
    if method != Method::GET || params.contains_key("comp") || params.contains_key("restype") {
        debug!(
            "Non-read or management operation ({} {}), redirecting to file share",
            method,
            uri.path()
        );
        return redirect_to(redirect_status, &urls.file_url, "file");
    }

    resolve_read(&state.client, &urls, &ctx.query, redirect_status).await
}

/// Probe the blob endpoint and produce the final response for a plain GET.
///
/// Separated from [`handle_request`] so the full probe/commit chain can be
/// exercised against an arbitrary upstream.
pub async fn resolve_read(
    client: &reqwest::Client,
    urls: &UpstreamUrls,
    query: &str,
    redirect_status: StatusCode,
) -> Result<Response, GatewayError> {
    match probe_blob_state(client, &urls.blob_url).await? {
        BlobState::NotFound => {
            debug!("Blob not found, redirecting to file share");
            redirect_to(redirect_status, &urls.file_url, "file")
        }
        BlobState::Unknown => {
            // Fail open to the file share. The counter and log line are the
            // only signals distinguishing this from an ordinary fallback.
            warn!(
                "Blob state absent or unrecognized for {}, falling back to file share",
                urls.blob_base_url
            );
            counter!(UNKNOWN_STATE_TOTAL).increment(1);
            redirect_to(redirect_status, &urls.file_url, "file")
        }
        BlobState::Committed => {
            debug!("Blob committed, redirecting to blob endpoint");
            redirect_to(redirect_status, &urls.blob_url, "blob")
        }
        BlobState::Uncommitted => {
            let names = fetch_uncommitted_blocks(client, &urls.blob_base_url, query).await?;
            commit_block_list(client, &urls.blob_base_url, query, &names).await?;
            counter!(BLOCK_COMMITS_TOTAL).increment(1);
            debug!(
                "Committed {} blocks for {}, redirecting to blob endpoint",
                names.len(),
                urls.blob_base_url
            );
            redirect_to(redirect_status, &urls.blob_url, "blob")
        }
    }
}

/// Build a bodyless redirect response to `location`.
fn redirect_to(
    status: StatusCode,
    location: &str,
    target: &'static str,
) -> Result<Response, GatewayError> {
    let value = HeaderValue::from_str(location)
        .map_err(|e| anyhow::anyhow!("Invalid redirect location {}: {}", location, e))?;
    counter!(REDIRECTS_TOTAL, "target" => target).increment(1);
    Ok((status, [(header::LOCATION, value)]).into_response())
}

// -- Tests --------------------------------------------------------------------
