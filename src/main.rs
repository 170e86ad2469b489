//! Mirror reverse proxy
//!
//! Serves several upstream sites under one public origin, keeping visitors
//! on the mirror by rewriting redirects and HTML.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────┐
//!                              │                    MIRROR PROXY                      │
//!                              │                                                      │
//!     Client Request           │  ┌─────────┐    ┌─────────┐    ┌──────────────┐      │
//!     ─────────────────────────┼─▶│  http   │───▶│ routing │───▶│   upstream   │──────┼──▶ Upstream
//!                              │  │ server  │    │resolver │    │   fetcher    │      │    Site
//!                              │  └─────────┘    └─────────┘    └──────┬───────┘      │
//!                              │                                       │              │
//!                              │                                       ▼              │
//!     Client Response          │  ┌─────────┐    ┌──────────────────────────────┐     │
//!     ◀────────────────────────┼──│response │◀───│ rewrite: redirect / html /   │     │
//!                              │  │ + CORS  │    │          passthrough         │     │
//!                              │  └─────────┘    └──────────────────────────────┘     │
//!                              │                                                      │
//!                              │  ┌────────────────────────────────────────────────┐ │
//!                              │  │             Cross-Cutting Concerns             │ │
//!                              │  │  config · observability · security headers     │ │
//!                              │  │  resilience (timeout/retry) · lifecycle        │ │
//!                              │  └────────────────────────────────────────────────┘ │
//!                              └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use mirror_proxy::config::{load_config, validate_config};
use mirror_proxy::http::HttpServer;
use mirror_proxy::lifecycle::{signals, Shutdown};
use mirror_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "mirror-proxy")]
#[command(about = "Reverse proxy that mirrors upstream sites under one origin", long_about = None)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability);
    tracing::info!("mirror-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let errors = validate_config(&config);
    for error in &errors {
        tracing::error!(error = %error, fatal = error.is_fatal(), "Invalid configuration");
    }
    if errors.iter().any(|e| e.is_fatal()) {
        return ExitCode::FAILURE;
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        public_origin = ?config.public_origin,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %config.listener.bind_address, error = %e, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };

    let server = match HttpServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build server");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    if let Err(e) = server.run(listener, server_shutdown).await {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
