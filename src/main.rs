//! Reverse-proxy API gateway.
//!
//! Terminates inbound HTTP(S), resolves each request to a registered
//! upstream by URL prefix, enforces the per-service policy chain
//! (allow-list, rate limit, token auth, cache, circuit breaker), and
//! streams the reply back while emitting metrics.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────┐
//!                      │                  API GATEWAY                   │
//!                      │                                                │
//!   Client Request     │  ┌────────┐   ┌──────────────┐   ┌──────────┐ │
//!   ───────────────────┼─▶│ server │──▶│ global rate  │──▶│ registry │ │
//!                      │  │ (axum) │   │   limiter    │   │  lookup  │ │
//!                      │  └────────┘   └──────────────┘   └────┬─────┘ │
//!                      │                                       │       │
//!                      │                                       ▼       │
//!                      │  ┌───────────────────────────────────────────┐│
//!                      │  │ per-service policy chain                  ││
//!                      │  │ rate limit → allow-list → auth → cache    ││
//!                      │  └───────────────────┬───────────────────────┘│
//!                      │                      ▼                        │
//!   Client Response    │  ┌────────┐   ┌──────────────┐                │
//!   ◀──────────────────┼──│ reply  │◀──│ circuit-     │◀───────────────┼── Upstream
//!                      │  │ +cache │   │ wrapped fwd  │                │    Service
//!                      │  └────────┘   └──────────────┘                │
//!                      │                                               │
//!                      │  control plane: /services/* /health /config   │
//!                      │  /metrics; background heartbeat + sweeps      │
//!                      └────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use edge_gateway::config;
use edge_gateway::lifecycle::{self, Shutdown};
use edge_gateway::observability;
use edge_gateway::HttpServer;

/// Reverse-proxy API gateway.
#[derive(Parser, Debug)]
#[command(name = "edge-gateway", about = "Reverse-proxy API gateway")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "./config/config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    observability::logging::init();

    let cli = Cli::parse();

    let config = match config::load_config(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(path = %cli.config.display(), error = %err, "Failed to load configuration");
            std::process::exit(1);
        }
    };
    tracing::info!(path = %cli.config.display(), "Config loaded successfully");

    let prometheus = match observability::install_recorder(&config.server.metrics) {
        Ok(handle) => handle,
        Err(err) => {
            tracing::error!(error = %err, "Failed to install metrics recorder");
            std::process::exit(1);
        }
    };

    let graceful_timeout = Duration::from_secs(config.server.graceful_timeout);
    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(config, prometheus);

    let server_shutdown = shutdown.clone();
    let mut server_task = tokio::spawn(async move { server.run(&server_shutdown).await });

    tokio::select! {
        _ = lifecycle::listen_for_signals(&shutdown) => {
            tracing::info!("Gracefully shutting down server");
            match tokio::time::timeout(graceful_timeout, &mut server_task).await {
                Ok(Ok(Ok(()))) => tracing::info!("Shutdown complete"),
                Ok(Ok(Err(err))) => {
                    tracing::error!(error = %err, "Error shutting down server");
                    std::process::exit(1);
                }
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "Server task failed");
                    std::process::exit(1);
                }
                Err(_) => {
                    tracing::warn!("Graceful shutdown timed out, exiting");
                    server_task.abort();
                }
            }
        }
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => tracing::info!("Server stopped"),
                Ok(Err(err)) => {
                    tracing::error!(error = %err, "Error starting server");
                    std::process::exit(1);
                }
                Err(err) => {
                    tracing::error!(error = %err, "Server task failed");
                    std::process::exit(1);
                }
            }
        }
    }
}
