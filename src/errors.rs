//! Gateway error types.
//!
//! Every variant maps to a fixed HTTP status.  The enum implements
//! [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(GatewayError::UpstreamFailure { .. })`.  Failure bodies are plain
//! text describing the failing call; redirects never carry a body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Errors surfaced to the client by the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The inbound path had fewer than the three mandatory segments.
    #[error("Missing {missing} in path({path})")]
    MissingPathSegments { missing: String, path: String },

    /// A commit was expected but the block list contained no uncommitted blocks.
    #[error("No uncommitted blocks found.")]
    NoUncommittedBlocks,

    /// An outbound call returned a non-success status. Never retried.
    #[error("{context}: {status}: {url}")]
    UpstreamFailure {
        context: &'static str,
        status: u16,
        url: String,
    },

    /// Catch-all for unexpected faults during processing.
    #[error("Unexpected error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Return the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::MissingPathSegments { .. } => StatusCode::BAD_REQUEST,
            GatewayError::NoUncommittedBlocks => StatusCode::BAD_REQUEST,
            GatewayError::UpstreamFailure { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

// -- Tests --------------------------------------------------------------------
