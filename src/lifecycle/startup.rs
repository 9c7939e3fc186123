//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the route table from validated configuration
//! - Bind the listener and wrap it for graceful shutdown
//! - Hand everything to a shutdown coordinator
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Routes are built before binding, so a bad route never opens a port

use std::io;
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::http::proxy::UpstreamError;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::ShutdownCoordinator;
use crate::net::{GracefulListener, TcpAcceptor};
use crate::observability::Logger;

/// Error type for startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid route: {0}")]
    Route(#[from] UpstreamError),

    #[error("failed to bind listener: {0}")]
    Bind(#[from] io::Error),
}

/// Bind the configured listener and prepare a coordinator to serve on it.
pub async fn start<L: Logger>(
    config: &GatewayConfig,
    logger: L,
) -> Result<ShutdownCoordinator<TcpAcceptor, HttpServer, L>, StartupError> {
    let server = HttpServer::from_config(&config.routes)?;
    tracing::info!(routes = config.routes.len(), "Routes loaded");

    let acceptor = TcpAcceptor::bind(&config.listener).await?;
    let listener = GracefulListener::new(acceptor, config.listener.drain_timeout());

    Ok(ShutdownCoordinator::new(listener, server, logger))
}
