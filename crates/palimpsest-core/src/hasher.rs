//! SHA-256 implementation of `ContentHasher`.
//!
//! Layout:
//!   digest(content)  = SHA-256(content)
//!   combine(l, r)    = SHA-256(l_bytes || r_bytes)
//!
//! `combine` hashes the raw 32-byte digests, not their hex text, so a
//! verifier in another language can reproduce roots with any SHA-256 library.

use sha2::{Digest, Sha256};

use palimpsest_contracts::hash::ContentHash;

use crate::traits::ContentHasher;

#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl Sha256Hasher {
    pub fn new() -> Self {
        Self
    }
}

impl ContentHasher for Sha256Hasher {
    fn digest(&self, content: &[u8]) -> ContentHash {
        to_content_hash(&Sha256::digest(content))
    }

    fn combine(&self, left: &ContentHash, right: &ContentHash) -> ContentHash {
        let mut hasher = Sha256::new();
        hasher.update(left.as_bytes());
        hasher.update(right.as_bytes());
        to_content_hash(&hasher.finalize())
    }
}

fn to_content_hash(output: &[u8]) -> ContentHash {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(output);
    ContentHash::from_bytes(bytes)
}
