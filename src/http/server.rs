//! HTTP server setup and the serve loop.
//!
//! # Responsibilities
//! - Accept connections from the graceful listener
//! - Serve HTTP/1.1 on each connection in its own task
//! - Dispatch requests to the route table
//! - Forward requests to upstream services
//! - Stop keep-alive on shutdown so connections finish and close

use axum::{
    body::Body,
    http::{Request, Response, StatusCode},
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioIo},
};
use std::convert::Infallible;
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;

use crate::config::RouteConfig;
use crate::http::proxy::{Upstream, UpstreamError};
use crate::lifecycle::shutdown::{Serve, ServeError};
use crate::net::{Acceptor, GracefulListener, ListenerError, TrackedConnection};
use crate::observability::metrics;
use crate::routing::RouteTable;

/// State shared by every connection task.
#[derive(Debug)]
struct ProxyState {
    routes: RouteTable<Upstream>,
    client: Client<HttpConnector, Body>,
}

/// HTTP server for the gateway.
#[derive(Debug)]
pub struct HttpServer {
    state: Arc<ProxyState>,
    /// Whether connections are kept alive between requests.
    keep_alive: watch::Sender<bool>,
}

impl HttpServer {
    /// Create a new HTTP server forwarding according to `routes`.
    pub fn new(routes: RouteTable<Upstream>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let (keep_alive, _) = watch::channel(true);
        Self {
            state: Arc::new(ProxyState { routes, client }),
            keep_alive,
        }
    }

    /// Build the route table from configuration.
    pub fn from_config(routes: &[RouteConfig]) -> Result<Self, UpstreamError> {
        let mut table = RouteTable::new();
        for route in routes {
            let upstream = Upstream::new(&route.upstream, &route.headers)?;
            tracing::debug!(path = %route.path, upstream = %upstream.base(), "Route registered");
            table.proxy(&route.path, upstream);
        }
        Ok(Self::new(table))
    }

    pub fn keep_alive(&self) -> bool {
        *self.keep_alive.borrow()
    }
}

impl<A: Acceptor> Serve<A> for HttpServer {
    async fn serve(&self, listener: Arc<GracefulListener<A>>) -> Result<(), ServeError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTP server starting");
        }

        loop {
            let conn = match listener.accept().await {
                Ok(conn) => conn,
                Err(ListenerError::Accept(_)) if listener.is_closed() => {
                    tracing::info!("HTTP server stopped accepting");
                    return Ok(());
                }
                Err(ListenerError::Accept(e)) if is_transient(&e) => {
                    tracing::warn!(error = %e, "Transient accept error");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let state = Arc::clone(&self.state);
            let keep_alive = self.keep_alive.subscribe();
            tokio::spawn(serve_connection(conn, state, keep_alive));
        }
    }

    fn disable_keep_alive(&self) {
        self.keep_alive.send_replace(false);
        tracing::info!("Keep-alive disabled");
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset | io::ErrorKind::Interrupted
    )
}

/// Serve HTTP/1.1 on one connection until the client or the server ends it.
async fn serve_connection<C>(
    conn: TrackedConnection<C>,
    state: Arc<ProxyState>,
    mut keep_alive: watch::Receiver<bool>,
) where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let connection_id = conn.id();
    let service = service_fn(move |request| {
        let state = Arc::clone(&state);
        async move { Ok::<_, Infallible>(state.handle(request).await) }
    });

    let mut alive = *keep_alive.borrow_and_update();
    let http = http1::Builder::new()
        .keep_alive(alive)
        .serve_connection(TokioIo::new(conn), service);
    tokio::pin!(http);

    loop {
        tokio::select! {
            served = http.as_mut() => {
                if let Err(e) = served {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Connection ended with error");
                }
                break;
            }
            changed = keep_alive.changed(), if alive => {
                let disabled = changed.is_err() || !*keep_alive.borrow_and_update();
                if disabled {
                    alive = false;
                    tracing::trace!(connection_id = %connection_id, "Finishing connection for shutdown");
                    http.as_mut().graceful_shutdown();
                }
            }
        }
    }
}

impl ProxyState {
    async fn handle(&self, request: Request<Incoming>) -> Response<Body> {
        let start_time = Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let Some((route, upstream)) = self.routes.match_path(&path) else {
            tracing::warn!(method = %method, path = %path, "No route matched");
            return status_response(StatusCode::NOT_FOUND, "No matching route found");
        };

        let outbound = match upstream.forward_request(route, request) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Failed to build upstream request");
                metrics::record_upstream(StatusCode::BAD_GATEWAY.as_u16());
                return status_response(StatusCode::BAD_GATEWAY, "Invalid upstream request");
            }
        };

        tracing::debug!(method = %method, path = %path, upstream = %outbound.uri(), "Proxying request");

        match self.client.request(outbound).await {
            Ok(response) => {
                let status = response.status();
                metrics::record_upstream(status.as_u16());
                tracing::debug!(
                    path = %path,
                    status = %status,
                    elapsed = ?start_time.elapsed(),
                    "Upstream responded"
                );
                response.map(Body::new)
            }
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Upstream error");
                metrics::record_upstream(StatusCode::BAD_GATEWAY.as_u16());
                status_response(StatusCode::BAD_GATEWAY, "Upstream request failed")
            }
        }
    }
}

fn status_response(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response
}
