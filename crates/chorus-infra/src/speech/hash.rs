//! SHA-256 content hashing for reusable speech clip names.

use sha2::{Digest, Sha256};

use chorus_core::speech::ContentHasher;

/// Lowercase hex SHA-256 of the content.
pub struct Sha256ContentHasher;

impl Sha256ContentHasher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Sha256ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentHasher for Sha256ContentHasher {
    fn compute_hash(&self, content: &str) -> String {
        let digest = Sha256::digest(content.as_bytes());
        format!("{:x}", digest)
    }
}
