//! Shutdown coordination for the gateway.
//!
//! # Data Flow
//! ```text
//! Running:
//!     serve loop task ──┐
//!     signal future  ───┴─▶ select (whichever finishes first)
//!
//! signal     → Draining → disable keep-alive → listener.close() → Terminated
//! serve Err  → Terminated (fatal, nothing to drain)
//! ```
//!
//! # Design Decisions
//! - One selection point for both inputs; the first to arrive drives the
//!   single transition out of `Running`
//! - The drain outcome is always terminal: a timeout is reported through the
//!   logger's fatal path, a clean drain through its info path
//! - `run` consumes the coordinator, so `Terminated` cannot be left

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinError;

use crate::lifecycle::signals::{Signal, TerminationSignals};
use crate::net::{Acceptor, GracefulListener, ListenerError};
use crate::observability::metrics::{record_drain, DrainOutcome};
use crate::observability::Logger;

/// A server that runs on a graceful listener until it is closed.
pub trait Serve<A: Acceptor>: Send + Sync + 'static {
    /// Accept and handle connections until the listener is closed.
    ///
    /// Returns `Ok` when the listener was closed for shutdown, `Err` when the
    /// loop stopped for any other reason.
    fn serve(
        &self,
        listener: Arc<GracefulListener<A>>,
    ) -> impl Future<Output = Result<(), ServeError>> + Send;

    /// Stop keeping connections alive between requests.
    fn disable_keep_alive(&self);
}

/// The serve loop stopped outside the shutdown sequence.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("serve loop failed: {0}")]
    Listener(#[from] ListenerError),

    #[error("serve task failed: {0}")]
    Join(#[from] JoinError),
}

/// Coordinator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Running,
    Draining,
    Terminated,
}

/// How the coordinator reached `Terminated`.
#[derive(Debug)]
pub enum Termination {
    /// Every connection closed before the deadline.
    Drained,
    /// The drain timed out or the listener failed to close.
    DrainFailed(ListenerError),
    /// The serve loop failed before any shutdown signal.
    ServeFailed(ServeError),
    /// Termination signals could not be registered.
    SignalsUnavailable(std::io::Error),
}

impl Termination {
    /// Process exit status for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            Termination::Drained => 0,
            _ => 1,
        }
    }
}

/// Runs a server on a graceful listener and drains it on termination signals.
pub struct ShutdownCoordinator<A, S, L> {
    listener: Arc<GracefulListener<A>>,
    server: Arc<S>,
    logger: Arc<L>,
    state_tx: watch::Sender<CoordinatorState>,
}

impl<A, S, L> ShutdownCoordinator<A, S, L>
where
    A: Acceptor,
    S: Serve<A>,
    L: Logger,
{
    pub fn new(listener: GracefulListener<A>, server: S, logger: L) -> Self {
        let (state_tx, _) = watch::channel(CoordinatorState::Running);
        Self {
            listener: Arc::new(listener),
            server: Arc::new(server),
            logger: Arc::new(logger),
            state_tx,
        }
    }

    pub fn listener(&self) -> &Arc<GracefulListener<A>> {
        &self.listener
    }

    pub fn server(&self) -> &Arc<S> {
        &self.server
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state_tx.borrow()
    }

    /// Observe state transitions while `run` is in progress.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state_tx.subscribe()
    }

    /// Serve until a termination signal arrives, then drain.
    pub async fn run(self) -> Termination {
        let mut signals = match TerminationSignals::register() {
            Ok(signals) => signals,
            Err(e) => {
                self.transition(CoordinatorState::Terminated);
                self.logger
                    .kill(format_args!("Failed to register signal handlers: {e}"));
                return Termination::SignalsUnavailable(e);
            }
        };

        self.run_until(async move { signals.recv().await }).await
    }

    /// Serve until `shutdown` resolves, then drain.
    pub async fn run_until<F>(self, shutdown: F) -> Termination
    where
        F: Future<Output = Signal>,
    {
        let mut serve_task = {
            let listener = Arc::clone(&self.listener);
            let server = Arc::clone(&self.server);
            tokio::spawn(async move { server.serve(listener).await })
        };

        match self.listener.local_addr() {
            Ok(addr) => self.logger.server(format_args!("Listening at {addr}")),
            Err(_) => self.logger.server(format_args!("Listening")),
        }

        tokio::pin!(shutdown);
        let mut serving = true;

        let signal = loop {
            tokio::select! {
                joined = &mut serve_task, if serving => {
                    serving = false;
                    match joined.map_err(ServeError::from).and_then(|served| served) {
                        Ok(()) => {
                            tracing::warn!("Serve loop exited before a shutdown signal");
                        }
                        Err(e) => {
                            self.transition(CoordinatorState::Terminated);
                            self.logger.kill(format_args!("{e}"));
                            return Termination::ServeFailed(e);
                        }
                    }
                }
                signal = &mut shutdown => break signal,
            }
        };

        self.transition(CoordinatorState::Draining);
        tracing::info!(
            signal = %signal,
            open = self.listener.open_connections(),
            max_wait = ?self.listener.max_wait(),
            "Shutdown requested"
        );
        self.logger.server(format_args!("Received shutdown {signal}"));
        self.server.disable_keep_alive();

        let started = Instant::now();
        let closed = self.listener.close().await;
        self.transition(CoordinatorState::Terminated);

        match closed {
            Ok(()) => {
                record_drain(DrainOutcome::Clean);
                tracing::info!(elapsed = ?started.elapsed(), "Drain complete");
                self.logger.server(format_args!("Closed"));
                Termination::Drained
            }
            Err(e) => {
                if e.is_drain_timeout() {
                    record_drain(DrainOutcome::Timeout);
                }
                tracing::warn!(
                    elapsed = ?started.elapsed(),
                    open = self.listener.open_connections(),
                    "Drain did not complete"
                );
                self.logger.kill(format_args!("Error closing listener: {e}"));
                Termination::DrainFailed(e)
            }
        }
    }

    fn transition(&self, next: CoordinatorState) {
        let previous = self.state_tx.send_replace(next);
        tracing::debug!(from = ?previous, to = ?next, "Coordinator state changed");
    }
}
