//! Configuration loading and types for BlobGate.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking, gateway redirect behavior, logging, and
//! observability.

use axum::http::StatusCode;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Gateway redirect / upstream settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings (metrics + health probes).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            gateway: GatewayConfig::default(),
            logging: LoggingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Gateway redirect / upstream settings.
///
/// The URL *shape* for both upstream targets is fixed
/// (`{scheme}://{account}.{suffix}/{share-or-container}{path}{sas}`);
/// the scheme and endpoint suffixes are configurable for sovereign
/// clouds and emulators.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// HTTP status code used for all redirects (307 or 302).
    #[serde(default = "default_redirect_status")]
    pub redirect_status: u16,

    /// URL scheme for upstream targets.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Host suffix of the file-share endpoint.
    #[serde(default = "default_file_suffix")]
    pub file_endpoint_suffix: String,

    /// Host suffix of the blob endpoint.
    #[serde(default = "default_blob_suffix")]
    pub blob_endpoint_suffix: String,

    /// Timeout in seconds applied to every outbound upstream call.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_seconds: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            redirect_status: default_redirect_status(),
            scheme: default_scheme(),
            file_endpoint_suffix: default_file_suffix(),
            blob_endpoint_suffix: default_blob_suffix(),
            upstream_timeout_seconds: default_upstream_timeout(),
        }
    }
}

impl GatewayConfig {
    /// The configured redirect status as a [`StatusCode`].
    ///
    /// `load_config` rejects non-redirection codes, so the fallback here
    /// only covers states constructed without validation (tests, defaults).
    pub fn redirect_status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.redirect_status).unwrap_or(StatusCode::TEMPORARY_REDIRECT)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,

    /// Enable the `/health` probe.
    #[serde(default = "default_true")]
    pub health_check: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics: true,
            health_check: true,
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9014
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_redirect_status() -> u16 {
    307
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_file_suffix() -> String {
    "file.core.windows.net".to_string()
}

fn default_blob_suffix() -> String {
    "blob.core.windows.net".to_string()
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    validate(&config)?;
    Ok(config)
}

/// Reject configurations that cannot produce a working gateway.
fn validate(config: &Config) -> anyhow::Result<()> {
    match StatusCode::from_u16(config.gateway.redirect_status) {
        Ok(code) if code.is_redirection() => Ok(()),
        _ => Err(anyhow::anyhow!(
            "gateway.redirect_status must be a 3xx status code, got {}",
            config.gateway.redirect_status
        )),
    }
}

// -- Tests --------------------------------------------------------------------
