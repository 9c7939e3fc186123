//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Provide the operator-facing logger used by the shutdown coordinator
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` overrides the configured level
//! - `kill` is the only place the library ends the process

use std::fmt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Operator-facing log sink for lifecycle events.
pub trait Logger: Send + Sync + 'static {
    /// Informational server message.
    fn server(&self, message: fmt::Arguments<'_>);

    /// Report a fatal condition and terminate the process.
    ///
    /// Implementations used in tests may return instead of exiting.
    fn kill(&self, message: fmt::Arguments<'_>);
}

/// Logger that writes through `tracing` and exits with status 1 on `kill`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn server(&self, message: fmt::Arguments<'_>) {
        tracing::info!(target: "gateway::server", "{}", message);
    }

    fn kill(&self, message: fmt::Arguments<'_>) {
        tracing::error!(target: "gateway::server", "{}", message);
        std::process::exit(1);
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `default_level`.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("gateway={default_level}").into());

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
