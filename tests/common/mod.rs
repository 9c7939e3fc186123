//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};

use gateway::lifecycle::{Serve, ServeError};
use gateway::net::{Acceptor, GracefulListener, TrackedConnection};
use gateway::observability::Logger;

/// In-memory stream whose close can be made to fail.
#[derive(Debug)]
pub struct TestStream {
    inner: DuplexStream,
    fail_close: bool,
}

impl TestStream {
    /// A stream and the remote end it talks to.
    pub fn pair() -> (Self, DuplexStream) {
        let (inner, remote) = tokio::io::duplex(1024);
        (Self { inner, fail_close: false }, remote)
    }

    /// A stream whose close always fails.
    pub fn failing_close() -> (Self, DuplexStream) {
        let (inner, remote) = tokio::io::duplex(1024);
        (Self { inner, fail_close: true }, remote)
    }
}

impl AsyncRead for TestStream {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TestStream {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.fail_close {
            return Poll::Ready(Err(io::Error::other("close failed")));
        }
        Pin::new(&mut this.inner).poll_shutdown(cx)
    }
}

/// What `ChannelAcceptor::close` does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseBehavior {
    /// Close succeeds.
    Succeed,
    /// Close fails, but accepts are blocked anyway.
    FailAfterBlocking,
    /// Close fails and accepts stay open.
    FailStillOpen,
}

/// Acceptor fed through a channel instead of a socket.
pub struct ChannelAcceptor {
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<TestStream>>,
    closed: watch::Sender<bool>,
    behavior: CloseBehavior,
}

impl ChannelAcceptor {
    pub fn new() -> (Self, mpsc::UnboundedSender<TestStream>) {
        Self::with_close(CloseBehavior::Succeed)
    }

    pub fn with_close(behavior: CloseBehavior) -> (Self, mpsc::UnboundedSender<TestStream>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        (
            Self {
                incoming: tokio::sync::Mutex::new(rx),
                closed,
                behavior,
            },
            tx,
        )
    }
}

pub fn peer_addr() -> SocketAddr {
    "127.0.0.1:50000".parse().unwrap()
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "listener closed")
}

impl Acceptor for ChannelAcceptor {
    type Conn = TestStream;

    async fn accept(&self) -> io::Result<(TestStream, SocketAddr)> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow_and_update() {
            return Err(closed_error());
        }

        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            stream = incoming.recv() => stream.map(|s| (s, peer_addr())).ok_or_else(closed_error),
            _ = closed.wait_for(|closed| *closed) => Err(closed_error()),
        }
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok("127.0.0.1:8080".parse().unwrap())
    }

    fn close(&self) -> io::Result<()> {
        match self.behavior {
            CloseBehavior::Succeed => {
                self.closed.send_replace(true);
                Ok(())
            }
            CloseBehavior::FailAfterBlocking => {
                self.closed.send_replace(true);
                Err(io::Error::other("close failed after blocking accepts"))
            }
            CloseBehavior::FailStillOpen => Err(io::Error::other("close failed")),
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// A logged lifecycle line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    Server(String),
    Kill(String),
}

/// Logger that records instead of printing or exiting.
#[derive(Debug, Clone, Default)]
pub struct RecordingLogger {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl RecordingLogger {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn kills(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                LogEntry::Kill(m) => Some(m),
                LogEntry::Server(_) => None,
            })
            .collect()
    }
}

impl Logger for RecordingLogger {
    fn server(&self, message: std::fmt::Arguments<'_>) {
        self.entries.lock().unwrap().push(LogEntry::Server(message.to_string()));
    }

    fn kill(&self, message: std::fmt::Arguments<'_>) {
        self.entries.lock().unwrap().push(LogEntry::Kill(message.to_string()));
    }
}

/// Serve collaborator that holds accepted connections for the test to close.
#[derive(Default)]
pub struct HoldingServer {
    connections: Mutex<Vec<TrackedConnection<TestStream>>>,
    keep_alive_disabled: std::sync::atomic::AtomicBool,
}

impl HoldingServer {
    pub fn take_connections(&self) -> Vec<TrackedConnection<TestStream>> {
        std::mem::take(&mut *self.connections.lock().unwrap())
    }

    pub fn held(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    pub fn keep_alive_disabled(&self) -> bool {
        self.keep_alive_disabled.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Serve<ChannelAcceptor> for HoldingServer {
    async fn serve(&self, listener: Arc<GracefulListener<ChannelAcceptor>>) -> Result<(), ServeError> {
        loop {
            match listener.accept().await {
                Ok(conn) => {
                    self.connections.lock().unwrap().push(conn);
                }
                Err(_) if listener.is_closed() => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn disable_keep_alive(&self) {
        self.keep_alive_disabled.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds or a second passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Start a mock backend that answers every request with its request path.
pub async fn start_mock_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let head = String::from_utf8_lossy(&buf[..n]);
                        let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();

                        let response_str = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            path.len(),
                            path
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
