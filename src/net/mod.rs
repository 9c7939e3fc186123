//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (raw accept, closable)
//!     → graceful.rs (count, wrap, drain on close)
//!     → connection.rs (pass-through stream, reports close)
//!     → Hand off to HTTP layer
//!
//! Listener States:
//!     Accepting → Draining → Drained | Timed out
//! ```
//!
//! # Design Decisions
//! - Accepts stop before the drain starts, so the count can only fall
//! - Each connection tracked for graceful shutdown
//! - Drain wait is bounded; stragglers are left to the process exit

pub mod connection;
pub mod counter;
pub mod graceful;
pub mod listener;

pub use connection::{ConnectionId, ConnectionState, TrackedConnection};
pub use counter::ConnectionCounter;
pub use graceful::{GracefulListener, ListenerError};
pub use listener::{Acceptor, TcpAcceptor};
