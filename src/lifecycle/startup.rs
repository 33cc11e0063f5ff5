//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start background tasks (signal watcher, metrics exporter)
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use metrics_exporter_prometheus::BuildError;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigError, ProxyConfig, ValidationError};
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::watch_signals;
use crate::observability::metrics;

/// Anything that stops the proxy from coming up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("route table: {0}")]
    Routes(#[from] ValidationError),

    #[error("upstream TLS setup: {0}")]
    Tls(#[from] rustls::Error),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("invalid address {0:?}")]
    Address(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Bring the proxy up and serve until a shutdown signal has been handled.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::Address(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let listen = config.listen.clone();
    let server = HttpServer::new(config, shutdown)?;
    let listener = TcpListener::bind(listen.as_str()).await?;
    tracing::info!(address = %listen, "listening");

    server.run(listener).await?;
    Ok(())
}
