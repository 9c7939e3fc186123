//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → path.rs (normalize, split into segments)
//!     → router.rs (longest prefix lookup)
//!     → Return: matched upstream or NoMatch
//! ```
//!
//! # Design Decisions
//! - Routes built at startup, immutable at runtime
//! - No regex in hot path (segment prefix matching only)
//! - Deterministic: same input always matches same route

pub mod path;
pub mod router;

pub use path::RoutePath;
pub use router::RouteTable;
