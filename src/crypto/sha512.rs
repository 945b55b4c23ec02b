//! # SHA-512 Digester
//!
//! SHA-512 over the UTF-8 bytes of the input, encoded with standard base64
//! (with padding). Every digest is 88 characters long.

use super::Digester;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha512};

/// Length of an encoded SHA-512 digest in characters
pub const ENCODED_DIGEST_LEN: usize = 88;

/// SHA-512 + base64 digester
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha512Digester;

impl Sha512Digester {
    /// Creates a new SHA-512 digester.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Digester for Sha512Digester {
    fn digest(&self, input: &str) -> String {
        let hash = Sha512::digest(input.as_bytes());
        BASE64.encode(hash)
    }

    fn algorithm(&self) -> &'static str {
        "sha512"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        let digester = Sha512Digester::new();
        assert_eq!(
            digester.digest("angryMonkey"),
            "ZEHhWB65gUlzdVwtDQArEyx+KVLzp/aTaRaPlBzYRIFj6vjFdqEb0Q5B8zVKCZ0vKbZPZklJz0Fd7su2A+gf7Q=="
        );
    }

    #[test]
    fn test_empty_input_is_hashed() {
        let digest = Sha512Digester::new().digest("");
        assert_eq!(digest.len(), ENCODED_DIGEST_LEN);
        assert!(digest.starts_with("z4PhNX7vuL3xVChQ1m2AB9Yg5AULVxXcg/SpIdNs6c5H0NE8XYXysP+DGNKHfuwv"));
    }

    #[test]
    fn test_fixed_length_output() {
        let digester = Sha512Digester::new();
        for input in ["a", "password", &"x".repeat(10_000), "ünïcödé"] {
            assert_eq!(digester.digest(input).len(), ENCODED_DIGEST_LEN);
        }
    }

    #[test]
    fn test_distinct_inputs_differ() {
        let digester = Sha512Digester::new();
        assert_ne!(digester.digest("one"), digester.digest("two"));
    }
}
