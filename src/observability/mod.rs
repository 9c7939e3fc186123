//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, lifecycle logger)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Connection ID flows through every connection-level event
//! - Metrics are cheap (atomic increments)
//! - A timed-out drain is logged and counted separately from a clean one

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, Logger, TracingLogger};
