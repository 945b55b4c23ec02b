//! # Middleware Module
//!
//! Per-request timing and completion logging.

use hyper::{Method, StatusCode};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Request timing and logging middleware
///
/// Created when a request arrives; logs one completion line with method,
/// path, status and latency once the response is ready.
#[derive(Debug, Clone)]
pub struct RequestMiddleware {
    method: Method,
    path: String,
    remote_addr: SocketAddr,
    start_time: Instant,
}

impl RequestMiddleware {
    /// Start timing a request
    #[must_use]
    pub fn start(method: Method, path: impl Into<String>, remote_addr: SocketAddr) -> Self {
        Self {
            method,
            path: path.into(),
            remote_addr,
            start_time: Instant::now(),
        }
    }

    /// Time since the request arrived
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log request completion with timing
    ///
    /// Client and server errors are logged at WARN, everything else at INFO.
    pub fn log_completion(&self, status: StatusCode) {
        let elapsed_ms = self.elapsed().as_secs_f64() * 1000.0;

        if status.is_client_error() || status.is_server_error() {
            warn!(
                "Request completed: {} {} from {} - {} ({:.2}ms)",
                self.method,
                self.path,
                self.remote_addr,
                status.as_u16(),
                elapsed_ms
            );
        } else {
            info!(
                "Request completed: {} {} from {} - {} ({:.2}ms)",
                self.method,
                self.path,
                self.remote_addr,
                status.as_u16(),
                elapsed_ms
            );
        }
    }
}
