//! # Server Configuration Module
//!
//! Configuration for the hash service. Values come from, in order of
//! precedence:
//! 1. Command-line arguments (the listen address is the single positional
//!    argument)
//! 2. Environment variables
//! 3. Default values

use crate::error::{HashWebError, Result};
use crate::store::{Visibility, VisibilityPolicy};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// Verbosity accepted on the command line and in `LOG_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Errors only
    Error,
    /// Warnings and errors
    Warn,
    /// Lifecycle events and request summaries
    #[default]
    Info,
    /// Per-operation detail
    Debug,
    /// Everything, including visibility misses
    Trace,
}

impl LogLevel {
    /// The `tracing` level used as the default filter directive
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Error => Level::ERROR,
            Self::Warn => Level::WARN,
            Self::Info => Level::INFO,
            Self::Debug => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        if level == Level::ERROR {
            Self::Error
        } else if level == Level::WARN {
            Self::Warn
        } else if level == Level::INFO {
            Self::Info
        } else if level == Level::DEBUG {
            Self::Debug
        } else {
            Self::Trace
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        })
    }
}

/// Parse `name` from the environment if it is set
fn env_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().map(Some).map_err(|e| {
            HashWebError::config_error(format!("Invalid {name} '{raw}': {e}"), None)
        }),
        Err(_) => Ok(None),
    }
}

/// Server configuration
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "hash-web",
    about = "Digests submitted passwords and hands them back by key",
    version,
    long_about = None
)]
pub struct ServerConfig {
    /// Network address to listen on
    ///
    /// Use "0.0.0.0:8080" to listen on all interfaces.
    #[arg(
        value_name = "ADDRESS:PORT",
        default_value = "127.0.0.1:8080",
        env = "HASH_WEB_BIND_ADDR",
        help = "Network address to listen on"
    )]
    pub bind_addr: SocketAddr,

    /// Logging level for the server
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        value_name = "LEVEL",
        default_value_t = LogLevel::Info,
        env = "LOG_LEVEL",
        ignore_case = true,
        help = "Logging level"
    )]
    pub log_level: LogLevel,

    /// Maximum request body size in bytes
    ///
    /// Form bodies larger than this are rejected with 400.
    #[arg(
        short = 'm',
        long = "max-payload-size",
        value_name = "BYTES",
        default_value_t = crate::MAX_PAYLOAD_SIZE,
        env = "MAX_PAYLOAD_SIZE",
        help = "Maximum request payload size in bytes"
    )]
    pub max_payload_size: usize,

    /// Time allowed for reading a request body, in milliseconds
    #[arg(
        short = 't',
        long = "request-timeout",
        value_name = "MILLISECONDS",
        default_value_t = crate::REQUEST_TIMEOUT_MS,
        env = "REQUEST_TIMEOUT_MS",
        help = "Request body read timeout in milliseconds"
    )]
    pub request_timeout_ms: u64,

    /// Number of Tokio worker threads
    ///
    /// If not specified, twice the number of CPU cores capped at 16.
    #[arg(
        short = 'w',
        long = "worker-threads",
        value_name = "COUNT",
        env = "WORKER_THREADS",
        help = "Number of worker threads (default: 2x CPU cores, max 16)"
    )]
    pub worker_threads: Option<usize>,

    /// How digest visibility is decided
    #[arg(
        long = "visibility",
        value_enum,
        value_name = "POLICY",
        default_value_t = VisibilityPolicy::SecondOfMinute,
        env = "VISIBILITY_POLICY",
        help = "Visibility policy for stored digests"
    )]
    pub visibility_policy: VisibilityPolicy,

    /// Visibility delay in seconds
    #[arg(
        long = "visibility-delay",
        value_name = "SECONDS",
        default_value_t = crate::store::DEFAULT_VISIBILITY_DELAY_SECS,
        env = "VISIBILITY_DELAY_SECS",
        help = "Visibility delay in seconds"
    )]
    pub visibility_delay_secs: u64,

    /// Enable Prometheus metrics endpoint at /metrics
    #[arg(
        long = "enable-metrics",
        env = "ENABLE_METRICS",
        help = "Enable Prometheus metrics endpoint"
    )]
    pub enable_metrics: bool,

    /// Enable health check endpoint at /health
    #[arg(
        long = "enable-health-check",
        env = "ENABLE_HEALTH_CHECK",
        default_value = "true",
        action = clap::ArgAction::Set,
        help = "Enable health check endpoint"
    )]
    pub enable_health_check: bool,
}

impl ServerConfig {
    /// Create a new configuration with default values
    ///
    /// ```rust
    /// use hash_web::ServerConfig;
    ///
    /// let config = ServerConfig::new();
    /// assert_eq!(config.bind_addr.port(), 8080);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from command-line arguments and environment
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Load configuration from environment variables only
    ///
    /// Reads the same variables as the command line. Unset variables keep
    /// their default values.
    ///
    /// ## Errors
    /// - `HashWebError::ConfigError`: a variable is set but does not parse
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(bind_addr) = env_var("HASH_WEB_BIND_ADDR")? {
            config.bind_addr = bind_addr;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.log_level = LogLevel::from_str(level.trim(), true).map_err(|e| {
                HashWebError::config_error(format!("Invalid LOG_LEVEL '{level}': {e}"), None)
            })?;
        }
        if let Some(size) = env_var("MAX_PAYLOAD_SIZE")? {
            config.max_payload_size = size;
        }
        if let Some(timeout) = env_var("REQUEST_TIMEOUT_MS")? {
            config.request_timeout_ms = timeout;
        }
        if let Some(workers) = env_var("WORKER_THREADS")? {
            config.worker_threads = Some(workers);
        }
        if let Ok(policy) = std::env::var("VISIBILITY_POLICY") {
            config.visibility_policy =
                VisibilityPolicy::from_str(policy.trim(), true).map_err(|e| {
                    HashWebError::config_error(
                        format!("Invalid VISIBILITY_POLICY '{policy}': {e}"),
                        None,
                    )
                })?;
        }
        if let Some(delay) = env_var("VISIBILITY_DELAY_SECS")? {
            config.visibility_delay_secs = delay;
        }
        if let Some(metrics) = env_var("ENABLE_METRICS")? {
            config.enable_metrics = metrics;
        }
        if let Some(health) = env_var("ENABLE_HEALTH_CHECK")? {
            config.enable_health_check = health;
        }

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// ## Errors
    /// - `HashWebError::ConfigError`: zero payload size, zero timeout or
    ///   zero worker threads
    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.ip().is_unspecified() {
            tracing::warn!(
                "Binding to wildcard address {} - the service will accept connections on all interfaces",
                self.bind_addr
            );
        }

        if self.max_payload_size == 0 {
            return Err(HashWebError::config_error(
                "Maximum payload size cannot be zero".to_string(),
                None,
            ));
        }

        if self.request_timeout_ms == 0 {
            return Err(HashWebError::config_error(
                "Request timeout cannot be zero".to_string(),
                None,
            ));
        }

        if let Some(workers) = self.worker_threads {
            if workers == 0 {
                return Err(HashWebError::config_error(
                    "Worker thread count cannot be zero".to_string(),
                    None,
                ));
            }

            if workers > 64 {
                tracing::warn!(
                    "Very high worker thread count: {} - this may cause excessive context switching",
                    workers
                );
            }
        }

        if self.visibility_policy == VisibilityPolicy::SecondOfMinute && self.visibility_delay_secs >= 59 {
            tracing::warn!(
                "Visibility delay of {}s with the second-of-minute policy makes every digest visible",
                self.visibility_delay_secs
            );
        }

        Ok(())
    }

    /// Get the number of worker threads to run with
    #[must_use]
    pub fn get_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get() * 2)
                .unwrap_or(4)
                .min(16)
        })
    }

    /// Visibility rule the store should apply
    #[must_use]
    pub fn visibility(&self) -> Visibility {
        Visibility::new(self.visibility_policy, self.visibility_delay_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((crate::DEFAULT_BIND_ADDR, crate::DEFAULT_PORT)),
            log_level: LogLevel::Info,
            max_payload_size: crate::MAX_PAYLOAD_SIZE,
            request_timeout_ms: crate::REQUEST_TIMEOUT_MS,
            worker_threads: None,
            visibility_policy: VisibilityPolicy::SecondOfMinute,
            visibility_delay_secs: crate::store::DEFAULT_VISIBILITY_DELAY_SECS,
            enable_metrics: false,
            enable_health_check: true,
        }
    }
}
