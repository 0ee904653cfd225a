//! Signature database and its on-disk store.
//!
//! The store keeps the current database behind an `Arc` snapshot. Scans clone
//! the `Arc` and keep using it even if an update swaps in a new database
//! while they run.

use crate::core::config::SignatureConfig;
use crate::core::error::{Error, Result};
use crate::detection::signature::{HashAlgorithm, HashLine, SignatureEntry};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Version stamped on databases rebuilt from the flat hash lists.
pub const TEXT_SOURCE_VERSION: &str = "1.0.0 (from local hash lists)";

/// Version of a database with no entries at all.
pub const EMPTY_VERSION: &str = "0.0.0";

/// `last_updated` value for a database that was never updated.
pub const NEVER_UPDATED: &str = "Never";

/// Version metadata carried alongside the hash maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    /// Opaque version string, compared by equality only
    #[serde(default = "default_version")]
    pub version: String,
    /// ISO-8601 timestamp or "Never"
    #[serde(default = "default_last_updated")]
    pub last_updated: String,
}

fn default_version() -> String {
    EMPTY_VERSION.to_string()
}

fn default_last_updated() -> String {
    NEVER_UPDATED.to_string()
}

impl Default for DatabaseMetadata {
    fn default() -> Self {
        Self {
            version: default_version(),
            last_updated: default_last_updated(),
        }
    }
}

/// Hash-to-threat-name mappings, one per algorithm, plus metadata.
///
/// Every key is a lowercase hex digest of the right length for its map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureDatabase {
    #[serde(default)]
    md5: HashMap<String, String>,
    #[serde(default)]
    sha256: HashMap<String, String>,
    #[serde(default)]
    pub metadata: DatabaseMetadata,
}

impl SignatureDatabase {
    /// An empty database with version "0.0.0" and no update time.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a snapshot/update document, dropping malformed keys.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: SignatureDatabase = serde_json::from_str(json)?;
        Ok(raw.sanitized())
    }

    /// Serialize to the snapshot document format.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn map(&self, algorithm: HashAlgorithm) -> &HashMap<String, String> {
        match algorithm {
            HashAlgorithm::Md5 => &self.md5,
            HashAlgorithm::Sha256 => &self.sha256,
        }
    }

    fn map_mut(&mut self, algorithm: HashAlgorithm) -> &mut HashMap<String, String> {
        match algorithm {
            HashAlgorithm::Md5 => &mut self.md5,
            HashAlgorithm::Sha256 => &mut self.sha256,
        }
    }

    /// Insert a validated entry, replacing any previous name for the hash.
    pub fn insert(&mut self, entry: SignatureEntry) {
        self.map_mut(entry.algorithm)
            .insert(entry.hash, entry.threat_name);
    }

    /// Look up a digest. Case-insensitive; malformed digests never match.
    pub fn lookup(&self, hash: &str, algorithm: HashAlgorithm) -> Option<&str> {
        let key = algorithm.normalize(hash)?;
        self.map(algorithm).get(&key).map(String::as_str)
    }

    /// Number of signatures for one algorithm.
    pub fn count(&self, algorithm: HashAlgorithm) -> usize {
        self.map(algorithm).len()
    }

    /// Total number of signatures.
    pub fn len(&self) -> usize {
        self.md5.len() + self.sha256.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set `last_updated` to the current local time.
    pub fn stamp_now(&mut self) -> &str {
        self.metadata.last_updated = Local::now().to_rfc3339();
        &self.metadata.last_updated
    }

    /// Lowercase every key and drop those that fail the format check.
    fn sanitized(mut self) -> Self {
        for algorithm in HashAlgorithm::ALL {
            let map = std::mem::take(self.map_mut(algorithm));
            let mut clean = HashMap::with_capacity(map.len());
            for (hash, name) in map {
                match algorithm.normalize(&hash) {
                    Some(key) => {
                        clean.insert(key, name);
                    }
                    None => log::warn!("Dropping invalid {} signature '{}'", algorithm, hash),
                }
            }
            *self.map_mut(algorithm) = clean;
        }
        self
    }
}

/// Summary of the loaded database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    pub version: String,
    pub last_updated: String,
    pub md5_count: usize,
    pub sha256_count: usize,
}

impl std::fmt::Display for DatabaseInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "version {} ({} MD5, {} SHA256 signatures, last updated {})",
            self.version, self.md5_count, self.sha256_count, self.last_updated
        )
    }
}

/// Owner of the current signature database and its persisted forms.
pub struct SignatureStore {
    config: SignatureConfig,
    current: RwLock<Arc<SignatureDatabase>>,
}

impl SignatureStore {
    /// Create a store holding an empty database. Nothing is read from disk.
    pub fn new(config: SignatureConfig) -> Self {
        Self {
            config,
            current: RwLock::new(Arc::new(SignatureDatabase::empty())),
        }
    }

    /// Create a store and load its database from disk.
    pub fn open(config: SignatureConfig) -> Result<Self> {
        let store = Self::new(config);
        store.load()?;
        Ok(store)
    }

    /// Storage locations this store reads and writes.
    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// Load the database from disk and make it current.
    ///
    /// Data problems never fail the load; only a poisoned lock does.
    pub fn load(&self) -> Result<Arc<SignatureDatabase>> {
        let db = Arc::new(self.read_database());
        let mut current = self
            .current
            .write()
            .map_err(|_| Error::lock_poisoned("signature store (load)"))?;
        *current = Arc::clone(&db);
        Ok(db)
    }

    /// Read the database from the snapshot, falling back to the hash lists.
    pub fn read_database(&self) -> SignatureDatabase {
        if let Some(db) = self.read_snapshot() {
            return db;
        }

        let mut db = SignatureDatabase::empty();
        for algorithm in HashAlgorithm::ALL {
            let path = match algorithm {
                HashAlgorithm::Md5 => self.config.md5_list_file(),
                HashAlgorithm::Sha256 => self.config.sha256_list_file(),
            };
            for entry in read_hash_list(&path, algorithm) {
                db.insert(entry);
            }
        }

        if db.is_empty() {
            log::warn!("No signatures could be loaded; starting with an empty database");
            return SignatureDatabase::empty();
        }

        db.metadata.version = TEXT_SOURCE_VERSION.to_string();
        db.stamp_now();

        if let Err(e) = self.persist(&db) {
            log::error!("Failed to cache signatures loaded from hash lists: {}", e);
        } else {
            log::info!("Cached {} signatures loaded from hash lists", db.len());
        }

        db
    }

    fn read_snapshot(&self) -> Option<SignatureDatabase> {
        let path = self.config.cache_file();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No signature cache at {:?}", path);
                return None;
            }
            Err(e) => {
                log::error!("Failed to read signature cache {:?}: {}", path, e);
                return None;
            }
        };

        match SignatureDatabase::from_json(&contents) {
            Ok(db) => {
                log::info!("Loaded {} signatures from cache {:?}", db.len(), path);
                Some(db)
            }
            Err(e) => {
                log::error!(
                    "Signature cache {:?} is corrupt ({}); falling back to hash lists",
                    path,
                    e
                );
                None
            }
        }
    }

    /// Write the full database to the snapshot location.
    pub fn persist(&self, db: &SignatureDatabase) -> Result<()> {
        let path = self.config.cache_file();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::DirectoryAccess {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        // Write-then-rename so a crash never leaves a half-written cache
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, db.to_json()?).map_err(|e| Error::file_write(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Error::file_write(&path, e))?;

        log::debug!("Signature cache written to {:?}", path);
        Ok(())
    }

    /// Write the plain-text last-updated marker.
    pub fn write_marker(&self, timestamp: &str) -> Result<()> {
        let path = self.config.marker_file();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::DirectoryAccess {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&path, timestamp).map_err(|e| Error::file_write(&path, e))
    }

    /// Look up a digest in the current database.
    pub fn lookup(&self, hash: &str, algorithm: HashAlgorithm) -> Result<Option<String>> {
        Ok(self
            .snapshot()?
            .lookup(hash, algorithm)
            .map(str::to_string))
    }

    /// Swap in a new database. The old one is dropped once no scan holds it.
    pub fn replace(&self, db: SignatureDatabase) -> Result<()> {
        let mut current = self
            .current
            .write()
            .map_err(|_| Error::lock_poisoned("signature store (replace)"))?;
        *current = Arc::new(db);
        Ok(())
    }

    /// The current database snapshot.
    pub fn snapshot(&self) -> Result<Arc<SignatureDatabase>> {
        self.current
            .read()
            .map(|db| Arc::clone(&db))
            .map_err(|_| Error::lock_poisoned("signature store (read)"))
    }

    /// Version and size information for the current database.
    pub fn info(&self) -> Result<DatabaseInfo> {
        let db = self.snapshot()?;
        Ok(DatabaseInfo {
            version: db.metadata.version.clone(),
            last_updated: db.metadata.last_updated.clone(),
            md5_count: db.count(HashAlgorithm::Md5),
            sha256_count: db.count(HashAlgorithm::Sha256),
        })
    }
}

/// Parse a flat hash list, skipping malformed lines with a warning.
fn read_hash_list(path: &Path, algorithm: HashAlgorithm) -> Vec<SignatureEntry> {
    let contents = match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("{:?} not found; no {} signatures loaded from it", path, algorithm);
            return Vec::new();
        }
        Err(e) => {
            log::error!("Failed to read {} hash list {:?}: {}", algorithm, path, e);
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        match SignatureEntry::parse_line(line, algorithm) {
            HashLine::Entry(entry) => entries.push(entry),
            HashLine::Skip => {}
            HashLine::Invalid(hash) => log::warn!(
                "Skipping invalid {} hash in {:?} line {}: '{}'",
                algorithm,
                path,
                line_no + 1,
                hash
            ),
        }
    }

    log::info!("Loaded {} {} signatures from {:?}", entries.len(), algorithm, path);
    entries
}
