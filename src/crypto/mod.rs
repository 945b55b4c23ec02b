//! # Digest Module
//!
//! The store treats digesting as a black-box capability: a string goes in, a
//! fixed-length printable string comes out. [`Digester`] is that seam, and
//! [`Sha512Digester`] is the implementation the service runs with.

pub mod sha512;

pub use sha512::Sha512Digester;

/// Computes a fixed-length digest string for an input string
///
/// Implementations must be deterministic: equal inputs always produce equal
/// outputs. They are called while the store holds its write lock, so they
/// should be CPU-bound and never block on I/O.
pub trait Digester: Send + Sync + std::fmt::Debug {
    /// Digest `input` and return the encoded result
    fn digest(&self, input: &str) -> String;

    /// Short algorithm name used in logs and the health document
    fn algorithm(&self) -> &'static str;
}
