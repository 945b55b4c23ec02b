//! # Error Handling Module
//!
//! Error types for the transport and process layers of the hash service.
//! The digest store itself never fails: a missing or not-yet-visible key is an
//! `Option::None`, and statistics over zero submissions are defined as zero.
//! Everything that can go wrong around the store (malformed requests, socket
//! failures, bad configuration) is represented here.
//!
//! Client responses only ever carry a generic message from
//! [`HashWebError::client_message`]; the detailed message is kept for logs.

use thiserror::Error;

/// Result type alias for the hash-web library
pub type Result<T> = std::result::Result<T, HashWebError>;

/// Errors raised outside the core store
///
/// ## Error Categories
///
/// - **Request Errors**: malformed paths, keys, form bodies
/// - **Method Errors**: HTTP methods other than GET and POST
/// - **Server Errors**: socket and HTTP protocol failures
/// - **Configuration Errors**: invalid server configuration
/// - **Internal Errors**: unexpected failures such as serialization
#[derive(Error, Debug)]
pub enum HashWebError {
    /// Invalid client request
    ///
    /// Covers requests the adapter cannot map onto a store operation:
    /// - Non-numeric keys in `/hash/{key}`
    /// - Unreadable, oversized or non-form bodies
    /// - Body reads exceeding the request timeout
    #[error("Invalid request: {message}")]
    RequestError {
        /// Internal error message for logging
        message: String,
    },

    /// HTTP method other than GET or POST
    #[error("Method not allowed: {method}")]
    MethodNotAllowed {
        /// The rejected method
        method: String,
    },

    /// HTTP server operation failed
    ///
    /// Bind, accept and response-building failures.
    #[error("Server error: {message}")]
    ServerError {
        /// Internal error message for logging
        message: String,
        /// Optional source error for error chain analysis
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Server configuration is invalid
    ///
    /// Only expected at startup.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Internal error message for logging
        message: String,
        /// Optional source error for error chain analysis
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    InternalError {
        /// Internal error message for logging
        message: String,
        /// Optional source error for error chain analysis
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl HashWebError {
    /// Create a new request error with message
    #[inline]
    pub fn request_error<T>(message: T) -> Self
    where
        T: Into<String>,
    {
        Self::RequestError {
            message: message.into(),
        }
    }

    /// Create a method-not-allowed error for the given method
    #[inline]
    pub fn method_not_allowed<T>(method: T) -> Self
    where
        T: Into<String>,
    {
        Self::MethodNotAllowed {
            method: method.into(),
        }
    }

    /// Create a new server error with message and optional source
    #[inline]
    pub fn server_error<T>(message: T, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self
    where
        T: Into<String>,
    {
        Self::ServerError {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error with message and optional source
    #[inline]
    pub fn config_error<T>(message: T, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self
    where
        T: Into<String>,
    {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new internal error with message and optional source
    #[inline]
    pub fn internal_error<T>(message: T, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self
    where
        T: Into<String>,
    {
        Self::InternalError {
            message: message.into(),
            source,
        }
    }

    /// Get the HTTP status code for this error
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::RequestError { .. } => 400,
            Self::MethodNotAllowed { .. } => 405,
            Self::ServerError { .. } | Self::ConfigError { .. } | Self::InternalError { .. } => 500,
        }
    }

    /// Get the sanitized error message for client responses
    ///
    /// Returns `&'static str` so responses never echo request data or
    /// internal state back to the caller.
    #[inline]
    #[must_use]
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::RequestError { .. } => "Bad request",
            Self::MethodNotAllowed { .. } => "Only GET and POST methods are supported",
            Self::ServerError { .. } | Self::InternalError { .. } => "Internal server error",
            Self::ConfigError { .. } => "Service unavailable",
        }
    }

    /// Get the internal error message for logging
    ///
    /// This message may contain request details and should never be sent to
    /// clients.
    #[inline]
    #[must_use]
    pub fn internal_message(&self) -> &str {
        match self {
            Self::RequestError { message }
            | Self::ServerError { message, .. }
            | Self::ConfigError { message, .. }
            | Self::InternalError { message, .. } => message,
            Self::MethodNotAllowed { method } => method,
        }
    }

    /// Check if this error should be logged at ERROR level
    ///
    /// Client mistakes are logged at WARN; everything else indicates a
    /// problem with the service itself.
    #[inline]
    #[must_use]
    pub fn is_critical(&self) -> bool {
        match self {
            Self::RequestError { .. } | Self::MethodNotAllowed { .. } => false,
            Self::ServerError { .. } | Self::ConfigError { .. } | Self::InternalError { .. } => true,
        }
    }
}

impl From<std::io::Error> for HashWebError {
    #[inline]
    fn from(err: std::io::Error) -> Self {
        Self::server_error(format!("I/O error: {err}"), Some(Box::new(err)))
    }
}

impl From<serde_json::Error> for HashWebError {
    #[inline]
    fn from(err: serde_json::Error) -> Self {
        Self::internal_error(format!("JSON serialization error: {err}"), Some(Box::new(err)))
    }
}

impl From<serde_urlencoded::de::Error> for HashWebError {
    #[inline]
    fn from(err: serde_urlencoded::de::Error) -> Self {
        Self::request_error(format!("Form decoding error: {err}"))
    }
}

impl From<multer::Error> for HashWebError {
    #[inline]
    fn from(err: multer::Error) -> Self {
        Self::request_error(format!("Multipart decoding error: {err}"))
    }
}

impl From<hyper::Error> for HashWebError {
    #[inline]
    fn from(err: hyper::Error) -> Self {
        Self::server_error(format!("Hyper error: {err}"), Some(Box::new(err)))
    }
}

impl From<http::Error> for HashWebError {
    #[inline]
    fn from(err: http::Error) -> Self {
        Self::server_error(format!("HTTP error: {err}"), Some(Box::new(err)))
    }
}
