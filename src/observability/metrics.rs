//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_open_connections` (gauge): connections counted by the listener
//! - `gateway_connections_accepted_total` (counter)
//! - `gateway_drain_total` (counter): shutdown drains by `outcome` (clean, timeout)
//! - `gateway_upstream_requests_total` (counter): forwarded requests by status
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - Prometheus exporter is optional and served on its own address

use std::net::SocketAddr;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Outcome label of a finished drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    Clean,
    Timeout,
}

impl DrainOutcome {
    fn as_str(self) -> &'static str {
        match self {
            DrainOutcome::Clean => "clean",
            DrainOutcome::Timeout => "timeout",
        }
    }
}

pub fn record_drain(outcome: DrainOutcome) {
    metrics::counter!("gateway_drain_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_upstream(status: u16) {
    metrics::counter!("gateway_upstream_requests_total", "status" => status.to_string()).increment(1);
}
