//! Gateway (v1)
//!
//! A reverse-proxy gateway that drains open connections before exiting.
//!
//! # Architecture Overview
//!
//! ```text
//!                       ┌──────────────────────────────────────────────────┐
//!                       │                     GATEWAY                       │
//!                       │                                                   │
//!     Client Request    │  ┌──────────┐   ┌──────────┐   ┌─────────────┐   │
//!     ──────────────────┼─▶│ graceful │──▶│   http   │──▶│   routing   │   │
//!                       │  │ listener │   │  server  │   │    table    │   │
//!                       │  └────┬─────┘   └──────────┘   └──────┬──────┘   │
//!                       │       │ counts open                   ▼          │
//!     Client Response   │       │ connections            ┌─────────────┐   │
//!     ◀─────────────────┼───────┼────────────────────────│  upstream   │◀──┼──── Upstream
//!                       │       ▼                        │  dispatch   │   │     Service
//!                       │  ┌──────────────────────┐      └─────────────┘   │
//!                       │  │ shutdown coordinator │◀── SIGINT/SIGTERM       │
//!                       │  │ stop accept → drain  │                        │
//!                       │  └──────────────────────┘                        │
//!                       └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use clap::Parser;

use gateway::config::{load_config, validate_config, ConfigError, GatewayConfig};
use gateway::lifecycle;
use gateway::observability::{init_logging, metrics, TracingLogger};

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "Reverse-proxy gateway with graceful shutdown", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override how long shutdown waits for open connections, in milliseconds.
    #[arg(long)]
    drain_timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(drain_timeout_ms) = cli.drain_timeout_ms {
        config.listener.drain_timeout_ms = drain_timeout_ms;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    init_logging(&config.observability.log_level);
    tracing::info!("gateway v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        drain_timeout_ms = config.listener.drain_timeout_ms,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let coordinator = lifecycle::start(&config, TracingLogger).await?;
    let termination = coordinator.run().await;

    tracing::info!(outcome = ?termination, "Shutdown complete");
    std::process::exit(termination.exit_code());
}
