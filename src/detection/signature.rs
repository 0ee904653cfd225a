//! Signature types and hash-list parsing.

use serde::{Deserialize, Serialize};

/// Hash algorithm a signature is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha256,
}

impl HashAlgorithm {
    /// All supported algorithms, in lookup order.
    pub const ALL: [HashAlgorithm; 2] = [HashAlgorithm::Sha256, HashAlgorithm::Md5];

    /// Expected length of the lowercase hex digest.
    pub fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::Md5 => 32,
            HashAlgorithm::Sha256 => 64,
        }
    }

    /// Get string representation for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "md5",
            HashAlgorithm::Sha256 => "sha256",
        }
    }

    /// Threat name used when a hash list line carries no name.
    pub fn default_threat_name(&self) -> &'static str {
        match self {
            HashAlgorithm::Md5 => "Generic MD5 Threat",
            HashAlgorithm::Sha256 => "Generic SHA256 Threat",
        }
    }

    /// Normalize a hex digest for this algorithm.
    ///
    /// Returns the lowercase form, or `None` when the length or alphabet is wrong.
    pub fn normalize(&self, hash: &str) -> Option<String> {
        let hash = hash.trim();
        if hash.len() != self.hex_len() || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(hash.to_ascii_lowercase())
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithm::Md5 => write!(f, "MD5"),
            HashAlgorithm::Sha256 => write!(f, "SHA256"),
        }
    }
}

/// A single validated signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    /// Lowercase hex digest
    pub hash: String,
    /// Threat name reported on match
    pub threat_name: String,
    /// Algorithm the digest belongs to
    pub algorithm: HashAlgorithm,
}

/// Outcome of parsing one line of a flat hash list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashLine {
    /// A valid entry
    Entry(SignatureEntry),
    /// Blank line or `#` comment
    Skip,
    /// Hash failed the algorithm's format check
    Invalid(String),
}

impl SignatureEntry {
    /// Parse a `hash` or `hash,threat_name` line.
    pub fn parse_line(line: &str, algorithm: HashAlgorithm) -> HashLine {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return HashLine::Skip;
        }

        let (raw_hash, name) = match line.split_once(',') {
            Some((hash, name)) => (hash.trim(), name.trim()),
            None => (line, ""),
        };

        match algorithm.normalize(raw_hash) {
            Some(hash) => HashLine::Entry(SignatureEntry {
                hash,
                threat_name: if name.is_empty() {
                    algorithm.default_threat_name().to_string()
                } else {
                    name.to_string()
                },
                algorithm,
            }),
            None => HashLine::Invalid(raw_hash.to_string()),
        }
    }
}
