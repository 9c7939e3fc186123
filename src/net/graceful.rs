//! Listener decorator that drains open connections on close.
//!
//! # Responsibilities
//! - Count every accepted connection before handing it out
//! - On close, stop accepting first, then wait for open connections to close
//! - Bound the wait with a fixed deadline
//!
//! # Design Decisions
//! - Open connections are never forcibly closed; the deadline is the only lever
//! - Accept failures are passed through untouched and never counted
//! - Connection state is owned here and only lent to connections as a `Weak`

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::net::connection::TrackedConnection;
use crate::net::counter::ConnectionCounter;
use crate::net::listener::Acceptor;

/// Error type for graceful listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to accept a connection.
    #[error("failed to accept: {0}")]
    Accept(#[source] io::Error),

    /// The underlying listener failed to close.
    #[error("failed to close listener: {0}")]
    Close(#[source] io::Error),

    /// Connections were still open when the deadline passed.
    #[error("cannot complete graceful drain in {max_wait:?} ({open} connections still open)")]
    DrainTimeout { max_wait: Duration, open: usize },
}

impl ListenerError {
    pub fn is_drain_timeout(&self) -> bool {
        matches!(self, ListenerError::DrainTimeout { .. })
    }
}

/// A listener that tracks its connections and drains them on close.
#[derive(Debug)]
pub struct GracefulListener<A> {
    inner: A,
    max_wait: Duration,
    counter: Arc<ConnectionCounter>,
}

impl<A: Acceptor> GracefulListener<A> {
    /// Wrap `inner`, allowing up to `max_wait` for connections to close on shutdown.
    pub fn new(inner: A, max_wait: Duration) -> Self {
        Self {
            inner,
            max_wait,
            counter: Arc::new(ConnectionCounter::new()),
        }
    }

    /// Accept the next connection.
    ///
    /// The connection is counted as open before it is returned. A connection
    /// that arrives once a drain has been requested is dropped and reported
    /// as an accept error.
    pub async fn accept(&self) -> Result<TrackedConnection<A::Conn>, ListenerError> {
        let (stream, peer_addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        let open = self.counter.acquire();
        if self.counter.drain_requested() {
            // Either this sees the flag or the drain sees this slot.
            self.counter.release();
            tracing::debug!(peer_addr = %peer_addr, "Connection refused, listener is draining");
            return Err(ListenerError::Accept(io::Error::new(
                io::ErrorKind::NotConnected,
                "listener is draining",
            )));
        }
        let conn = TrackedConnection::new(stream, peer_addr, Arc::downgrade(&self.counter));
        metrics::counter!("gateway_connections_accepted_total").increment(1);

        tracing::debug!(
            connection_id = %conn.id(),
            peer_addr = %peer_addr,
            open,
            "Connection accepted"
        );
        Ok(conn)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Stop accepting and wait for open connections to close.
    ///
    /// A close error from the underlying listener takes precedence over the
    /// drain result. The drain still runs after a close error as long as the
    /// underlying listener reports that accepts are blocked.
    pub async fn close(&self) -> Result<(), ListenerError> {
        if let Err(e) = self.inner.close() {
            if !self.inner.is_closed() {
                return Err(ListenerError::Close(e));
            }

            tracing::warn!(error = %e, "Listener close failed but accepts are blocked, draining anyway");
            if let Err(drain) = self.wait_for_zero_connections().await {
                tracing::warn!(error = %drain, "Drain after failed close did not complete");
            }
            return Err(ListenerError::Close(e));
        }

        self.wait_for_zero_connections().await
    }

    async fn wait_for_zero_connections(&self) -> Result<(), ListenerError> {
        let open = self.counter.request_drain();
        if open == 0 {
            tracing::debug!("No open connections, drain complete");
            return Ok(());
        }

        tracing::info!(open, max_wait = ?self.max_wait, "Draining connections");

        match tokio::time::timeout(self.max_wait, self.counter.drained()).await {
            Ok(()) => Ok(()),
            Err(_) => Err(ListenerError::DrainTimeout {
                max_wait: self.max_wait,
                open: self.counter.open(),
            }),
        }
    }

    /// Connections currently counted as open.
    pub fn open_connections(&self) -> usize {
        self.counter.open()
    }

    pub fn is_draining(&self) -> bool {
        self.counter.drain_requested()
    }

    /// Whether the underlying listener has stopped accepting.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed() || self.is_draining()
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Number of times the drain-complete signal has been settled (0 or 1).
    pub fn drain_settles(&self) -> usize {
        self.counter.settles()
    }
}
