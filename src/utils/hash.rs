//! Hash calculation utilities.

use crate::core::error::{Error, Result};
use crate::detection::signature::HashAlgorithm;
use md5::{Digest, Md5};
use sha2::Sha256;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Buffer size for reading files (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Both digests of a file, computed in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHashes {
    /// Lowercase hex SHA256
    pub sha256: String,
    /// Lowercase hex MD5
    pub md5: String,
    /// Bytes hashed
    pub size: u64,
}

impl FileHashes {
    /// Digest for the given algorithm.
    pub fn digest(&self, algorithm: HashAlgorithm) -> &str {
        match algorithm {
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha256 => &self.sha256,
        }
    }
}

/// Hash calculator for files and buffers.
pub struct HashCalculator;

impl HashCalculator {
    /// Calculate MD5 and SHA256 of a file in a single streaming pass.
    pub fn hash_file(path: &Path) -> Result<FileHashes> {
        let file = File::open(path).map_err(|e| Error::file_read(path, e))?;
        Self::hash_reader(file).map_err(|e| Error::file_read(path, e))
    }

    /// Calculate MD5 and SHA256 of everything a reader yields.
    pub fn hash_reader<R: Read>(reader: R) -> std::io::Result<FileHashes> {
        let mut reader = BufReader::with_capacity(BUFFER_SIZE, reader);
        let mut sha256_hasher = Sha256::new();
        let mut md5_hasher = Md5::new();
        let mut size = 0u64;

        loop {
            let chunk = reader.fill_buf()?;
            if chunk.is_empty() {
                break;
            }
            sha256_hasher.update(chunk);
            md5_hasher.update(chunk);
            let consumed = chunk.len();
            reader.consume(consumed);
            size += consumed as u64;
        }

        Ok(FileHashes {
            sha256: hex::encode(sha256_hasher.finalize()),
            md5: hex::encode(md5_hasher.finalize()),
            size,
        })
    }

    /// Calculate SHA256 hash of bytes.
    pub fn sha256_bytes(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    /// Calculate MD5 hash of bytes.
    pub fn md5_bytes(data: &[u8]) -> String {
        hex::encode(Md5::digest(data))
    }
}
