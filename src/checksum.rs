//! Checksum utilities for index fingerprints

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 checksum over an ordered path list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum over paths in order. Each path is newline-terminated
    /// so that ["/a/b"] and ["/a", "/b"] never collide.
    pub fn of_paths<'a, I>(paths: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hasher = Sha256::new();
        for path in paths {
            hasher.update(path.as_bytes());
            hasher.update(b"\n");
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
