//! Accepted connections and their closure accounting.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Pass reads and writes through to the accepted stream
//! - Report a successful close back to the owning listener
//!
//! # Design Decisions
//! - The back-reference is a `Weak`; a connection never keeps listener state alive
//! - A failed close is not counted as closed, even when the value is later
//!   dropped; the drain deadline is the backstop for that connection
//! - Dropping a connection that was never closed releases its slot, since the
//!   drop closes the underlying stream

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::net::counter::ConnectionCounter;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accounting state of a tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Counted as open by the listener.
    Open,
    /// Closed successfully and uncounted.
    Closed,
    /// Close failed; stays counted until the drain deadline.
    CloseFailed,
}

/// A stream accepted by a [`GracefulListener`](crate::net::GracefulListener).
///
/// Behaves exactly like the wrapped stream. Its only addition is reporting a
/// successful close (`shutdown`) or a drop back to the listener's counter.
#[derive(Debug)]
pub struct TrackedConnection<C> {
    inner: C,
    id: ConnectionId,
    peer_addr: SocketAddr,
    state: ConnectionState,
    counter: Weak<ConnectionCounter>,
}

impl<C> TrackedConnection<C> {
    pub(crate) fn new(inner: C, peer_addr: SocketAddr, counter: Weak<ConnectionCounter>) -> Self {
        Self {
            inner,
            id: ConnectionId::new(),
            peer_addr,
            state: ConnectionState::Open,
            counter,
        }
    }

    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Uncount this connection. No-op unless it is still open.
    fn release(&mut self) {
        if self.state != ConnectionState::Open {
            return;
        }
        self.state = ConnectionState::Closed;

        // The listener may already be gone after a timed-out drain.
        if let Some(counter) = self.counter.upgrade() {
            let open = counter.release();
            tracing::trace!(connection_id = %self.id, open, "Connection closed");
        }
    }
}

impl<C: AsyncWrite + Unpin> TrackedConnection<C> {
    /// Close the connection.
    ///
    /// On failure the error is returned and the connection stays counted as
    /// open; it is not retried.
    pub async fn close(&mut self) -> io::Result<()> {
        std::future::poll_fn(|cx| Pin::new(&mut *self).poll_shutdown(cx)).await
    }
}

impl<C: AsyncRead + Unpin> AsyncRead for TrackedConnection<C> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<C: AsyncWrite + Unpin> AsyncWrite for TrackedConnection<C> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_shutdown(cx) {
            Poll::Ready(Ok(())) => {
                this.release();
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => {
                if this.state == ConnectionState::Open {
                    this.state = ConnectionState::CloseFailed;
                    tracing::warn!(
                        connection_id = %this.id,
                        peer_addr = %this.peer_addr,
                        error = %e,
                        "Connection close failed; left open for the drain deadline"
                    );
                }
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<C> Drop for TrackedConnection<C> {
    fn drop(&mut self) {
        self.release();
    }
}
