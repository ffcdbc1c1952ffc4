//! BlobGate library — edge gateway for a two-protocol Azure storage backend.
//!
//! Clients issue path-based requests of the form
//! `/{account}/{share}/{container}[/{object-path}]?{sas}`. For each request
//! the gateway probes the blob endpoint's commit state, lazily finalizes
//! uncommitted block blobs via Put Block List, and redirects the client to
//! either the blob endpoint (fast path) or the always-consistent file-share
//! endpoint (fallback).

use crate::config::Config;

pub mod blocklist;
pub mod config;
pub mod context;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod probe;
pub mod server;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Outbound HTTP client shared by every upstream call.
    pub client: reqwest::Client,
}

impl AppState {
    /// Build the shared state, including the upstream HTTP client.
    ///
    /// Upstream redirects are never followed: a redirect response from the
    /// storage service is a terminal failure, the same as any other
    /// unexpected status.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(
                config.gateway.upstream_timeout_seconds,
            ))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self { config, client })
    }
}
