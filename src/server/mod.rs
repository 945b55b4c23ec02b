//! # HTTP Server Module
//!
//! Hyper-based HTTP/1 transport for the digest store. Every accepted
//! connection runs on its own Tokio task; all of them share one [`Store`].
//!
//! ## Routes
//!
//! - `POST /hash`, `POST /`: submit a password, respond with its key
//! - `GET /hash/{key}`, `POST /hash/{key}`: fetch a digest
//! - `GET /stats`: request count and average processing time
//! - `GET /shutdown`, `POST /shutdown`: stop the server gracefully
//! - `GET /health`, `GET /metrics`: operational endpoints, if enabled
//!
//! ## Shutdown
//!
//! Shutdown is signalled through a [`ShutdownHandle`]. The accept loop stops,
//! open connections finish their in-flight request and close, and
//! [`BoundServer::serve`] returns `Ok(())`.

pub mod config;
pub mod handlers;
pub mod middleware;

pub use config::ServerConfig;
pub use handlers::HashHandler;
pub use middleware::RequestMiddleware;

use crate::error::{HashWebError, Result};
use crate::store::Store;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// Cloneable trigger for stopping a running server
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Ask the server to stop
    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }

    /// Whether shutdown has been requested
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Resolves once `receiver` has seen a shutdown request
async fn shutdown_requested(receiver: &mut watch::Receiver<bool>) {
    // An Err means every sender is gone, which only happens when the server
    // itself is being dropped; treat it as a stop request.
    let _ = receiver.wait_for(|stop| *stop).await;
}

/// Hash web server: routing plus shared state
#[derive(Debug)]
pub struct HashWebServer {
    config: ServerConfig,
    store: Arc<Store>,
    hash_handler: HashHandler,
    shutdown: ShutdownHandle,
    started_at: Instant,
}

impl HashWebServer {
    /// Create a server with a fresh store configured from `config`
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let store = Arc::new(Store::new(config.visibility()));
        Self::with_store(config, store)
    }

    /// Create a server around an existing store
    #[must_use]
    pub fn with_store(config: ServerConfig, store: Arc<Store>) -> Self {
        info!(
            "Initializing hash web server: algorithm={}, visibility={} ({}s)",
            store.algorithm(),
            store.visibility().policy,
            store.visibility().delay_secs
        );

        let hash_handler = HashHandler::new(
            Arc::clone(&store),
            config.max_payload_size,
            Duration::from_millis(config.request_timeout_ms),
        );

        Self {
            config,
            store,
            hash_handler,
            shutdown: ShutdownHandle::new(),
            started_at: Instant::now(),
        }
    }

    /// Shared store served by this server
    #[must_use]
    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// Handle that stops this server when triggered
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Bind the configured address
    ///
    /// ## Errors
    /// - `HashWebError::ServerError`: the address cannot be bound
    #[instrument(level = "info", name = "server_bind", skip(self))]
    pub async fn bind(self) -> Result<BoundServer> {
        let bind_addr = self.config.bind_addr;

        let listener = TcpListener::bind(bind_addr).await.map_err(|e| {
            error!("Failed to bind to address {}: {}", bind_addr, e);
            HashWebError::server_error(
                format!("Failed to bind to address {bind_addr}: {e}"),
                Some(Box::new(e)),
            )
        })?;
        let local_addr = listener.local_addr()?;

        info!("Server listening on {}", local_addr);

        Ok(BoundServer {
            server: Arc::new(self),
            listener,
            local_addr,
        })
    }

    /// Bind and serve until shutdown is requested
    pub async fn start(self) -> Result<()> {
        self.bind().await?.serve().await
    }

    /// Route one HTTP request
    #[instrument(level = "debug", name = "handle_request", skip(self, request))]
    async fn handle_request(
        &self,
        request: Request<Incoming>,
        remote_addr: SocketAddr,
    ) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
        let method = request.method().clone();
        let path = request.uri().path().to_owned();
        let middleware = RequestMiddleware::start(method.clone(), path.clone(), remote_addr);

        let segments: Vec<&str> = path.split('/').collect();

        let response = match (&method, segments.as_slice()) {
            (&Method::POST, ["", "" | "hash"]) => self.hash_handler.handle_create(request).await,
            (&Method::GET | &Method::POST, ["", "hash", key]) => self.hash_handler.handle_fetch(key),
            (&Method::GET, ["", "stats"]) => self.hash_handler.handle_stats(),
            (&Method::GET | &Method::POST, ["", "shutdown"]) => self.handle_shutdown(),
            (&Method::GET, ["", "health"]) if self.config.enable_health_check => {
                self.handle_health_check()
            }
            (&Method::GET, ["", "metrics"]) if self.config.enable_metrics => self.handle_metrics(),
            (m, _) if *m != Method::GET && *m != Method::POST => {
                Err(HashWebError::method_not_allowed(m.as_str()))
            }
            _ => {
                debug!("Unknown endpoint: {} {}", method, path);
                Ok(Self::create_error_response(
                    StatusCode::NOT_FOUND,
                    "Not found",
                ))
            }
        };

        let final_response = match response {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_critical() {
                    error!("Critical error handling request from {}: {}", remote_addr, e);
                } else {
                    warn!(
                        "Request error from {}: {}",
                        remote_addr,
                        e.internal_message()
                    );
                }

                Self::create_error_response(
                    StatusCode::from_u16(e.status_code())
                        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                    e.client_message(),
                )
            }
        };

        middleware.log_completion(final_response.status());
        Ok(final_response)
    }

    /// Acknowledge and trigger shutdown
    fn handle_shutdown(&self) -> Result<Response<Full<Bytes>>> {
        info!("Hash web server shutting down");
        self.shutdown.trigger();

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(CACHE_CONTROL, "no-cache")
            .body(Full::new(Bytes::from_static(b"OK")))?)
    }

    /// JSON health document
    fn handle_health_check(&self) -> Result<Response<Full<Bytes>>> {
        let stats = self.store.stats();
        let visibility = self.store.visibility();

        let health_status = serde_json::json!({
            "status": "healthy",
            "version": crate::VERSION,
            "uptime_secs": self.started_at.elapsed().as_secs(),
            "store": {
                "algorithm": self.store.algorithm(),
                "entries": self.store.len(),
                "request_count": stats.request_count,
                "average_us": stats.average,
                "visibility_policy": visibility.policy,
                "visibility_delay_secs": visibility.delay_secs,
            }
        });

        let response_body = serde_json::to_string(&health_status)?;

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .body(Full::new(Bytes::from(response_body)))?)
    }

    /// Prometheus text exposition of the store counters
    fn handle_metrics(&self) -> Result<Response<Full<Bytes>>> {
        let stats = self.store.stats();

        let prometheus_metrics = format!(
            "# HELP hash_web_submissions_total Total digest submissions\n\
             # TYPE hash_web_submissions_total counter\n\
             hash_web_submissions_total {}\n\
             # HELP hash_web_processing_microseconds_total Total submission processing time\n\
             # TYPE hash_web_processing_microseconds_total counter\n\
             hash_web_processing_microseconds_total {}\n\
             # HELP hash_web_processing_microseconds_average Average submission processing time\n\
             # TYPE hash_web_processing_microseconds_average gauge\n\
             hash_web_processing_microseconds_average {}\n\
             # HELP hash_web_entries Stored digests\n\
             # TYPE hash_web_entries gauge\n\
             hash_web_entries {}\n",
            stats.request_count,
            stats.total_processing_us,
            stats.average,
            self.store.len(),
        );

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/plain; version=0.0.4")
            .header(CACHE_CONTROL, "no-cache")
            .body(Full::new(Bytes::from(prometheus_metrics)))?)
    }

    /// JSON error response `{"error": ..., "status": ...}`
    fn create_error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
        let error_body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        let body_string = serde_json::to_string(&error_body)
            .unwrap_or_else(|_| r#"{"error":"Internal server error","status":500}"#.to_string());

        let mut response = Response::new(Full::new(Bytes::from(body_string)));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        response
    }
}

/// A server whose listener is bound and ready to accept connections
#[derive(Debug)]
pub struct BoundServer {
    server: Arc<HashWebServer>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BoundServer {
    /// Address actually bound, useful when the configured port was 0
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle that stops this server when triggered
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.server.shutdown_handle()
    }

    /// Shared store served by this server
    #[must_use]
    pub fn store(&self) -> Arc<Store> {
        self.server.store()
    }

    /// Accept connections until shutdown is requested
    ///
    /// ## Errors
    /// - `HashWebError::ServerError`: accepting a connection failed
    #[instrument(level = "info", name = "server_serve", skip(self), fields(addr = %self.local_addr))]
    pub async fn serve(self) -> Result<()> {
        let Self {
            server, listener, ..
        } = self;

        let mut shutdown_rx = server.shutdown.subscribe();
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote_addr) = accepted.map_err(|e| {
                        error!("Failed to accept connection: {}", e);
                        HashWebError::server_error(
                            format!("Failed to accept connection: {e}"),
                            Some(Box::new(e)),
                        )
                    })?;

                    let server_clone = Arc::clone(&server);
                    let mut conn_shutdown_rx = server.shutdown.subscribe();

                    connections.spawn(async move {
                        let service = service_fn(move |req| {
                            let server = Arc::clone(&server_clone);
                            async move { server.handle_request(req, remote_addr).await }
                        });

                        let conn = hyper::server::conn::http1::Builder::new()
                            .serve_connection(TokioIo::new(stream), service);
                        tokio::pin!(conn);

                        tokio::select! {
                            result = conn.as_mut() => {
                                if let Err(e) = result {
                                    error!("Connection error from {}: {}", remote_addr, e);
                                }
                            }
                            () = shutdown_requested(&mut conn_shutdown_rx) => {
                                conn.as_mut().graceful_shutdown();
                                if let Err(e) = conn.await {
                                    error!("Connection error from {} during shutdown: {}", remote_addr, e);
                                }
                            }
                        }
                    });
                }
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                () = shutdown_requested(&mut shutdown_rx) => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);

        let drain_timeout = Duration::from_millis(server.config.request_timeout_ms);
        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(drain_timeout, drain).await.is_err() {
            warn!(
                "{} connections still open after {:?}, aborting them",
                connections.len(),
                drain_timeout
            );
            connections.abort_all();
        }

        info!("Server stopped");
        Ok(())
    }
}

/// Convenience function to run a hash web server until it is shut down
///
/// ## Example
/// ```rust,no_run
/// use hash_web::{start_server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ServerConfig {
///         bind_addr: "127.0.0.1:8080".parse()?,
///         ..ServerConfig::default()
///     };
///
///     start_server(config).await?;
///     Ok(())
/// }
/// ```
#[instrument(level = "info", name = "start_server")]
pub async fn start_server(config: ServerConfig) -> Result<()> {
    HashWebServer::new(config).start().await
}
