//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Build routes → Bind listener → Coordinator
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Disable keep-alive → Stop accepting → Drain → Exit
//!
//! Signals (signals.rs):
//!     SIGINT/SIGTERM → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then routes, then listener
//! - Ordered shutdown: stop accept, drain, exit
//! - Shutdown has timeout: exit after deadline even with open connections

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{CoordinatorState, Serve, ServeError, ShutdownCoordinator, Termination};
pub use signals::{Signal, TerminationSignals};
pub use startup::{start, StartupError};
