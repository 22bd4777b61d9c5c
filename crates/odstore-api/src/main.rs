//! odstore server binary
//!
//! OData document store with a `$batch` endpoint.
//!
//! # Usage
//!
//! ```bash
//! # With config file
//! odstore --config config.yaml
//!
//! # With environment variables only
//! ODSTORE_SERVER__PORT=9090 ODSTORE_BATCH__MAX_REQUESTS=500 odstore
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use odstore_api::http::{create_router, create_router_with_observability, AppState};
use odstore_api::observability::{init_logging, init_metrics, LoggingConfig};
use odstore_server::ServerConfig;
use odstore_storage::MemoryDataStore;

/// odstore - OData document store with `$batch` support
#[derive(Parser, Debug)]
#[command(name = "odstore")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "ODSTORE_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match args.config {
        Some(path) => ServerConfig::load(&path)?,
        None => ServerConfig::from_env()?,
    };

    init_logging(LoggingConfig::from_settings(&config.logging));

    info!(version = env!("CARGO_PKG_VERSION"), "Starting odstore server");

    // validate() only accepts the memory backend.
    info!(backend = %config.storage.backend, "Using in-memory storage backend");
    let storage = Arc::new(MemoryDataStore::new());
    let state = AppState::from_config(storage, &config);

    info!(
        max_requests = config.batch.max_requests,
        max_total_top = config.batch.max_total_top,
        timeout_millis = config.batch.timeout_millis,
        "Batch limits configured"
    );

    let router = if config.metrics.enabled {
        let metrics_state = init_metrics()?;
        info!(path = %config.metrics.path, "Metrics enabled");
        create_router_with_observability(state, metrics_state)
    } else {
        create_router(state)
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
