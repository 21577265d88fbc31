//! HTTP server and graceful shutdown.
//!
//! The server is the transport around the [`Dispatcher`]: it accepts
//! connections, buffers each request body completely, applies the per-verb
//! body rules, and writes back whatever envelope the dispatcher renders.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` (default 30 s) before sending SIGKILL.
//!
//! The server reacts by:
//! 1. Immediately stopping `listener.accept()`, so no new connections are made.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning from [`Server::serve`], which lets `main` exit cleanly.

use std::net::SocketAddr;

use bytes::Bytes;
use http::HeaderValue;
use http::header::CONNECTION;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Rejection, Result};
use crate::request::Request;

/// The HTTP server.
pub struct Server {
    bind: Bind,
}

enum Bind {
    Addr(String),
    Listener(TcpListener),
}

impl Server {
    /// Configures the server to bind to `addr` (`host:port`) when
    /// [`serve`](Server::serve) is called.
    ///
    /// ```rust,no_run
    /// use autoroute::Server;
    /// let server = Server::bind("127.0.0.1:8080");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { bind: Bind::Addr(addr.into()) }
    }

    /// Serves on an already bound listener.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { bind: Bind::Listener(listener) }
    }

    /// Starts accepting connections and dispatching them.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, dispatcher: Dispatcher) -> Result<()> {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr.as_str()).await?,
            Bind::Listener(listener) => listener,
        };
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "autoroute listening");

        // JoinSet tracks every spawned connection task so we can wait for
        // them all to finish during graceful shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a SIGTERM immediately stops
                // accepting new connections, even if more are queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let dispatcher = dispatcher.clone();
                    let timeout = dispatcher.timeout();
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let dispatcher = dispatcher.clone();
                            async move { serve_request(dispatcher, req, remote_addr).await }
                        });

                        // A stalled request head closes the connection.
                        let mut builder = ConnBuilder::new(TokioExecutor::new());
                        builder
                            .http1()
                            .timer(TokioTimer::new())
                            .header_read_timeout(timeout);

                        // A service error (no response could be produced)
                        // ends up here after hyper closes the connection.
                        if let Err(e) = builder.serve_connection(io, svc).await {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Drain: wait for every in-flight connection to finish before we return.
        while tasks.join_next().await.is_some() {}

        info!("autoroute stopped");
        Ok(())
    }
}

// ── Request handling ──────────────────────────────────────────────────────────

/// Buffers the body, applies the body rules, then dispatches.
///
/// The proxy timeout runs from the moment the head is parsed, so it covers
/// reading the body as well as the handler.
///
/// Returning `Err` makes hyper drop the connection without a response; that
/// only happens when a handler abandoned its request.
async fn serve_request(
    dispatcher: Dispatcher,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> std::result::Result<http::Response<Full<Bytes>>, Error> {
    let deadline = Instant::now() + dispatcher.timeout();
    let (parts, body) = req.into_parts();
    let (method, uri) = (parts.method.clone(), parts.uri.clone());

    let bytes = match tokio::time::timeout_at(deadline, body.collect()).await {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) => {
            let rejection = Rejection::UnreadableBody { cause: e.to_string() };
            return Ok(reject(&dispatcher, &method, &uri, &rejection));
        }
        Err(_) => {
            // The rest of the body is never read, so the connection cannot be reused.
            let url = uri.path_and_query().map_or("/", |pq| pq.as_str());
            let mut response = dispatcher.timed_out(url).into_inner();
            response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
            return Ok(response);
        }
    };

    let request = match Request::from_http(parts, &bytes) {
        Ok(request) => request,
        Err(rejection) => return Ok(reject(&dispatcher, &method, &uri, &rejection)),
    };

    match dispatcher.handle_until(request, deadline).await {
        Ok(response) => Ok(response.into_inner()),
        Err(e) => {
            error!(peer = %remote_addr, "closing connection: {e}");
            Err(e)
        }
    }
}

fn reject(
    dispatcher: &Dispatcher,
    method: &http::Method,
    uri: &http::Uri,
    rejection: &Rejection,
) -> http::Response<Full<Bytes>> {
    debug!(
        method = %method, path = uri.path(),
        status = u16::from(rejection.status()), "rejected"
    );
    dispatcher.reject(rejection).into_inner()
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown signal the process receives.
///
/// On Unix this listens for both **SIGTERM** and **SIGINT** (Ctrl-C).
/// On Windows only Ctrl-C is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
