//! Raw stream listeners.
//!
//! # Responsibilities
//! - Bind to the configured address
//! - Accept incoming TCP connections
//! - Stop accepting on close, waking any accept in progress
//!
//! # Design Decisions
//! - `Acceptor` is the seam the graceful listener decorates; tests plug in
//!   in-memory acceptors through it
//! - Tokio's `TcpListener` has no close, so closing drops the socket and a
//!   `watch` flag wakes pending accepts
//! - A pending accept holds its own handle to the socket, so the closed flag is
//!   checked before any queued connection is taken

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::config::ListenerConfig;

/// A listener for byte-stream connections.
pub trait Acceptor: Send + Sync + 'static {
    /// Connection type produced by `accept`.
    type Conn: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Wait for the next connection.
    ///
    /// Fails once the acceptor has been closed.
    fn accept(&self) -> impl Future<Output = io::Result<(Self::Conn, SocketAddr)>> + Send;

    /// Address the acceptor is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;

    /// Stop accepting connections.
    fn close(&self) -> io::Result<()>;

    /// Whether new accepts are blocked.
    fn is_closed(&self) -> bool;
}

/// Closable TCP acceptor.
#[derive(Debug)]
pub struct TcpAcceptor {
    /// The socket, taken out on close.
    inner: Mutex<Option<Arc<TcpListener>>>,
    local_addr: SocketAddr,
    closed_tx: watch::Sender<bool>,
}

impl TcpAcceptor {
    /// Bind to the configured address.
    pub async fn bind(config: &ListenerConfig) -> io::Result<Self> {
        let addr: SocketAddr = config
            .bind_address
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(addr).await?;
        let acceptor = Self::from_listener(listener)?;

        tracing::info!(address = %acceptor.local_addr, "Listener bound");
        Ok(acceptor)
    }

    /// Wrap an already bound tokio listener.
    pub fn from_listener(listener: TcpListener) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let (closed_tx, _) = watch::channel(false);
        Ok(Self {
            inner: Mutex::new(Some(Arc::new(listener))),
            local_addr,
            closed_tx,
        })
    }

    fn listener(&self) -> io::Result<Arc<TcpListener>> {
        self.inner
            .lock()
            .map_err(|_| io::Error::other("listener lock poisoned"))?
            .clone()
            .ok_or_else(listener_closed)
    }
}

impl Acceptor for TcpAcceptor {
    type Conn = TcpStream;

    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let mut closed = self.closed_tx.subscribe();
        let listener = self.listener()?;

        // Closed wins over a queued connection.
        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => Err(listener_closed()),
            accepted = listener.accept() => accepted,
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local_addr)
    }

    fn close(&self) -> io::Result<()> {
        let taken = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("listener lock poisoned"))?
            .take();

        match taken {
            Some(_) => {
                self.closed_tx.send_replace(true);
                tracing::debug!(address = %self.local_addr, "Listener closed");
                Ok(())
            }
            None => Err(listener_closed()),
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed_tx.borrow()
    }
}

fn listener_closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "listener closed")
}
