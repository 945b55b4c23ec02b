//! # Hash Web Library
//!
//! A small HTTP service that digests submitted passwords and hands the
//! digests back by key.
//!
//! A client posts a password and receives an integer key. Exchanging the key
//! later returns the SHA-512 digest of the password, base64 encoded, subject
//! to a visibility rule on the entry's age. The service also reports how many
//! digests it has created and their average processing time.
//!
//! ## Architecture
//!
//! - [`store`] - Request-serialized key/value store with delayed visibility
//!   and a running-average statistic
//! - [`crypto`] - The digest capability used by the store
//! - [`server`] - Hyper-based HTTP transport, configuration and middleware
//! - [`error`] - Error types for the transport and process layers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use hash_web::{start_server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "127.0.0.1:8080".parse()?,
//!         ..ServerConfig::default()
//!     };
//!
//!     start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! The store can also be used on its own:
//!
//! ```rust
//! use hash_web::store::{Store, Visibility};
//!
//! let store = Store::new(Visibility::default());
//! let key = store.submit("angryMonkey");
//! assert_eq!(key, 1);
//! assert_eq!(store.stats().request_count, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod server;
pub mod store;

pub use error::{HashWebError, Result};
pub use server::{start_server, HashWebServer, ServerConfig, ShutdownHandle};
pub use store::{StatsSnapshot, Store, Visibility, VisibilityPolicy};

use std::net::Ipv4Addr;

/// Version information for the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default server port
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address for the server
pub const DEFAULT_BIND_ADDR: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Maximum request body size in bytes (1 MiB)
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Timeout for reading a request body, in milliseconds
pub const REQUEST_TIMEOUT_MS: u64 = 30_000;
