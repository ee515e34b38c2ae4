//! Content digests.
//!
//! A `ContentHash` is a 32-byte digest produced by a `ContentHasher`
//! implementation. It is stored as raw bytes and always rendered (and
//! serialized) as 64 lowercase hex characters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// A 256-bit content digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Sentinel root of an empty entry set.
    ///
    /// 64 hex zeros. No real input hashes to this value, so an empty snapshot
    /// is unambiguous.
    pub const EMPTY_SET: ContentHash = ContentHash([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase 64-character hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 12 hex characters, for log lines and terminal output.
    pub fn short(&self) -> String {
        let mut s = self.to_hex();
        s.truncate(12);
        s
    }

    /// Parse a 64-character hex string.
    ///
    /// Returns `LedgerError::Validation` for wrong length or non-hex input.
    pub fn from_hex(s: &str) -> LedgerResult<Self> {
        let bytes = hex::decode(s).map_err(|e| LedgerError::Validation {
            reason: format!("invalid digest '{}': {}", s, e),
        })?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| LedgerError::Validation {
            reason: format!("digest must be 32 bytes, got {}", v.len()),
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_hex()
    }
}
