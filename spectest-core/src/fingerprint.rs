//! Content fingerprints used as stable identity keys
//!
//! A statement is normalized (lower-cased, trimmed, optionally whitespace
//! collapsed and trailing punctuation stripped), cut to a fixed prefix window
//! and hashed. Statements that agree within the window share a fingerprint
//! even if they differ after it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::config::{FingerprintConfig, TRAILING_PUNCTUATION};

/// Hex-encoded SHA-256 of a normalized statement or composite key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hashes an exact key without normalization or windowing
    pub fn of_key(key: &str) -> Self {
        Fingerprint(sha256_hex(key))
    }

    /// Wraps an already computed fingerprint string (e.g., read from a store)
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Fingerprint(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log output
    pub fn short(&self) -> &str {
        prefix_chars(&self.0, 12)
    }
}

/// The first `n` characters of `s`, cut on a character boundary
pub fn prefix_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computes fingerprints according to a normalization configuration
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter {
    config: FingerprintConfig,
}

impl Fingerprinter {
    pub fn new(config: FingerprintConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FingerprintConfig {
        &self.config
    }

    /// Normalizes a statement and truncates it to the prefix window
    pub fn normalize(&self, text: &str) -> String {
        let mut normalized = text.trim().to_lowercase();

        if self.config.collapse_whitespace {
            normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
        }

        if self.config.strip_trailing_punctuation {
            normalized = normalized
                .trim_end_matches(TRAILING_PUNCTUATION)
                .trim_end()
                .to_string();
        }

        normalized.chars().take(self.config.window).collect()
    }

    /// Fingerprint of a statement
    pub fn fingerprint(&self, text: &str) -> Fingerprint {
        Fingerprint(sha256_hex(&self.normalize(text)))
    }
}

/// Fingerprint of a statement under the default normalization
pub fn fingerprint(text: &str) -> Fingerprint {
    Fingerprinter::default().fingerprint(text)
}

fn sha256_hex(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}
