//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Tracked connection
//!     → server.rs (serve loop, HTTP/1.1 per connection)
//!     → [routing table picks upstream]
//!     → proxy.rs (rewrite URI and headers)
//!     → upstream response streamed back to the client
//! ```

pub mod proxy;
pub mod server;

pub use proxy::{Upstream, UpstreamError};
pub use server::HttpServer;
