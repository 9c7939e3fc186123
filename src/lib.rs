//! Reverse-proxy gateway with a graceful-shutdown listener.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{ShutdownCoordinator, Termination};
pub use net::{GracefulListener, TrackedConnection};
