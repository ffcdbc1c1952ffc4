//! Blob commit-state probing.
//!
//! One metadata-only HEAD request against the blob endpoint, classified
//! into a [`BlobState`].  Classification is derived solely from the most
//! recent probe; nothing is cached across requests.

use tracing::debug;

use crate::errors::GatewayError;

/// Metadata header carrying the blob's commit state.
pub const META_STATE_HEADER: &str = "x-ms-meta-state";

/// Commit state of a blob as reported by the metadata probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobState {
    /// The blob endpoint returned 404.
    NotFound,
    /// Staged blocks exist but the blob has not been finalized.
    Uncommitted,
    /// The blob is fully committed and readable.
    Committed,
    /// The state header was absent, empty, or unrecognized. A safe
    /// fallback, never an error.
    Unknown,
}

impl BlobState {
    /// Classify the value of the state metadata header, case-insensitively.
    pub fn classify(header: Option<&str>) -> Self {
        match header {
            Some(v) if v.eq_ignore_ascii_case("committed") => BlobState::Committed,
            Some(v) if v.eq_ignore_ascii_case("uncommitted") => BlobState::Uncommitted,
            _ => BlobState::Unknown,
        }
    }
}

/// Issue the metadata HEAD probe against `blob_url` and classify the result.
///
/// 404 maps to [`BlobState::NotFound`]; any other non-success status is a
/// terminal upstream failure surfaced to the client as-is.
pub async fn probe_blob_state(
    client: &reqwest::Client,
    blob_url: &str,
) -> Result<BlobState, GatewayError> {
    debug!("Probing blob metadata: {}", blob_url);

    let resp = client
        .head(blob_url)
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("Blob metadata request failed: {}", e))?;

    if resp.status() == reqwest::StatusCode::NOT_FOUND {
        return Ok(BlobState::NotFound);
    }

    if !resp.status().is_success() {
        return Err(GatewayError::UpstreamFailure {
            context: "Blob metadata fetch failed",
            status: resp.status().as_u16(),
            url: blob_url.to_string(),
        });
    }

    let state = resp
        .headers()
        .get(META_STATE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());

    Ok(BlobState::classify(state))
}

// -- Tests --------------------------------------------------------------------
