//! BlobGate -- edge gateway for Azure file-share / blob storage redirection.
//!
//! Stateless by design: every request reconstructs its context and
//! re-probes the blob endpoint from scratch. SIGTERM/SIGINT handlers only
//! stop accepting connections and wait for in-flight requests before
//! exiting -- there is nothing to clean up.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

/// Command-line arguments for the BlobGate server.
#[derive(Parser, Debug)]
#[command(
    name = "blobgate",
    version,
    about = "Edge gateway redirecting clients between Azure file-share and blob endpoints"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "blobgate.example.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing / logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!("Loading configuration from {}", cli.config);
    let config = blobgate::config::load_config(&cli.config)?;

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    // Initialize Prometheus metrics recorder and register metric descriptions.
    blobgate::metrics::init_metrics();
    blobgate::metrics::describe_metrics();
    info!("Prometheus metrics initialized");

    info!(
        "Upstream endpoints: file={} blob={} redirect_status={}",
        config.gateway.file_endpoint_suffix,
        config.gateway.blob_endpoint_suffix,
        config.gateway.redirect_status
    );

    let state = Arc::new(blobgate::AppState::new(config)?);
    let app = blobgate::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("BlobGate listening on {}", bind_addr);

    // Graceful shutdown: on SIGTERM/SIGINT, stop accepting new connections,
    // wait for in-flight requests to complete, then exit.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("BlobGate shut down");

    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
