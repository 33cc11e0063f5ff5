//! edge-proxy: a prefix-routing HTTP reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────────┐
//!                              │                      EDGE PROXY                          │
//!                              │                                                          │
//!     Client Request           │  ┌─────────┐    ┌──────────┐    ┌──────────────┐         │
//!     ─────────────────────────┼─▶│  http   │───▶│   cors   │───▶│   routing    │         │
//!                              │  │ server  │    │middleware│    │longest prefix│         │
//!                              │  └─────────┘    └──────────┘    └──────┬───────┘         │
//!                              │                                       │                  │
//!                              │                                       ▼                  │
//!                              │                               ┌──────────────┐          │
//!                              │                               │  admission   │          │
//!                              │                               │  + headers   │          │
//!                              │                               └──────┬───────┘          │
//!                              │                                       │                  │
//!                              │                                       ▼                  │
//!     Client Response          │  ┌─────────┐    ┌──────────┐    ┌──────────────┐         │
//!     ◀────────────────────────┼──│streaming│◀───│  header  │◀───│   upstream   │◀────────┼──── Upstream
//!                              │  │  body   │    │  merge   │    │  transport   │         │     Server
//!                              │  └─────────┘    └──────────┘    └──────────────┘         │
//!                              │                                                          │
//!                              │  ┌────────────────────────────────────────────────────┐ │
//!                              │  │  config · health · observability · lifecycle       │ │
//!                              │  └────────────────────────────────────────────────────┘ │
//!                              └──────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use edge_proxy::config::load_config;
use edge_proxy::lifecycle::{build_runtime, run};
use edge_proxy::observability::logging::init_logging;

/// Prefix-routing HTTP reverse proxy
#[derive(Parser)]
#[command(name = "edge-proxy", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    config: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logging is not up yet, so a bad config goes straight to stderr.
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("edge-proxy: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        config_version = %config.version,
        "edge-proxy starting"
    );

    let runtime = build_runtime(&config.runtime)?;
    if let Err(e) = runtime.block_on(run(config)) {
        tracing::error!(error = %e, "edge-proxy failed");
        return Err(e.into());
    }

    tracing::info!("shutdown complete");
    Ok(())
}
