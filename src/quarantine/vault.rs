//! Quarantine vault manager.
//!
//! Detected files are moved into `<vault>/items/` under a random name and
//! tracked in a JSON index (`<vault>/index.json`). Restoring moves the file
//! back to where it came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use crate::core::config::QuarantineConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{ScanReport, ScanStatus};
use crate::utils::hash::HashCalculator;

/// Subdirectory holding quarantined files.
pub const ITEMS_DIR: &str = "items";

/// Index file name.
pub const INDEX_FILE: &str = "index.json";

/// Extension given to files inside the vault.
pub const VAULT_EXTENSION: &str = "quarantine";

/// Record of one quarantined file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarantineItem {
    /// Unique identifier (UUID)
    pub id: String,
    /// Where the file was taken from
    pub original_path: PathBuf,
    /// Filename inside the items directory
    pub vault_filename: String,
    /// SHA-256 of the file content
    pub sha256: String,
    /// File size in bytes
    pub size: u64,
    /// Verdict that triggered the quarantine
    pub status: ScanStatus,
    /// Threat name or heuristic label
    pub threat_name: String,
    /// When the file was quarantined
    pub quarantined_at: DateTime<Utc>,
}

impl QuarantineItem {
    /// Whether `key` names this item by id or by original path.
    fn matches(&self, key: &str) -> bool {
        self.id == key || self.original_path == Path::new(key)
    }
}

/// Quarantine vault manager.
pub struct QuarantineVault {
    base_path: PathBuf,
    /// Serializes index read-modify-write cycles
    index_lock: Mutex<()>,
}

impl QuarantineVault {
    /// Open the vault at the configured location.
    pub fn from_config(config: &QuarantineConfig) -> Result<Self> {
        Self::open(&config.quarantine_dir())
    }

    /// Create or open a quarantine vault at the specified path.
    pub fn open(base_path: &Path) -> Result<Self> {
        let items_path = base_path.join(ITEMS_DIR);
        fs::create_dir_all(&items_path).map_err(|e| Error::DirectoryAccess {
            path: items_path.clone(),
            source: e,
        })?;

        Ok(Self {
            base_path: base_path.to_path_buf(),
            index_lock: Mutex::new(()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn items_path(&self) -> PathBuf {
        self.base_path.join(ITEMS_DIR)
    }

    fn index_path(&self) -> PathBuf {
        self.base_path.join(INDEX_FILE)
    }

    /// Move a detected file into the vault.
    pub fn quarantine(&self, report: &ScanReport) -> Result<QuarantineItem> {
        let path = report.path.as_path();
        let failed = |reason: String| Error::QuarantineFailed {
            path: path.to_path_buf(),
            reason,
        };

        if !report.status.is_detection() {
            return Err(failed(format!("verdict is {}, not a detection", report.status)));
        }
        if !path.is_file() {
            return Err(failed("file no longer exists".to_string()));
        }

        let hashes = HashCalculator::hash_file(path)?;

        let _guard = self.lock()?;
        let mut index = self.read_index()?;

        let id = Uuid::new_v4().to_string();
        let vault_filename = format!("{}.{}", id, VAULT_EXTENSION);
        let vault_path = self.items_path().join(&vault_filename);

        safe_move(path, &vault_path).map_err(|e| failed(format!("move failed: {}", e)))?;

        let item = QuarantineItem {
            id,
            original_path: path.to_path_buf(),
            vault_filename,
            sha256: hashes.sha256,
            size: hashes.size,
            status: report.status,
            threat_name: report.threat_name.clone().unwrap_or_default(),
            quarantined_at: Utc::now(),
        };
        index.push(item.clone());

        if let Err(e) = self.write_index(&index) {
            // Put the file back so nothing is left untracked
            if let Err(undo) = safe_move(&vault_path, path) {
                log::error!(
                    "Failed to return {:?} to {:?} after index error: {}",
                    vault_path,
                    path,
                    undo
                );
            }
            return Err(failed(format!("failed to record item: {}", e)));
        }

        log::info!("Quarantined {:?} as {}", path, item.id);
        Ok(item)
    }

    /// Move a quarantined file back to its original location.
    ///
    /// Refuses to overwrite a file that now exists at that location.
    pub fn restore(&self, id_or_path: &str) -> Result<QuarantineItem> {
        let _guard = self.lock()?;
        let mut index = self.read_index()?;
        let position = Self::position(&index, id_or_path)?;
        let item = index[position].clone();

        let failed = |reason: &str| Error::RestoreFailed {
            id: item.id.clone(),
            reason: reason.to_string(),
        };

        if item.original_path.exists() {
            return Err(failed("a file already exists at the original path"));
        }

        let vault_path = self.items_path().join(&item.vault_filename);
        if !vault_path.is_file() {
            return Err(failed("vault file is missing"));
        }

        safe_move(&vault_path, &item.original_path)
            .map_err(|e| failed(&format!("move failed: {}", e)))?;

        index.remove(position);
        self.write_index(&index)?;

        log::info!("Restored {} to {:?}", item.id, item.original_path);
        Ok(item)
    }

    /// Permanently delete a quarantined item.
    pub fn delete(&self, id_or_path: &str) -> Result<QuarantineItem> {
        let _guard = self.lock()?;
        let mut index = self.read_index()?;
        let position = Self::position(&index, id_or_path)?;
        let item = index.remove(position);

        let vault_path = self.items_path().join(&item.vault_filename);
        match fs::remove_file(&vault_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Vault file {:?} already gone", vault_path);
            }
            Err(e) => {
                return Err(Error::FileDelete {
                    path: vault_path,
                    source: e,
                })
            }
        }

        self.write_index(&index)?;
        log::info!("Deleted quarantined item {}", item.id);
        Ok(item)
    }

    /// List all quarantined items, oldest first.
    pub fn list(&self) -> Result<Vec<QuarantineItem>> {
        let _guard = self.lock()?;
        self.read_index()
    }

    /// Look up an item by id or original path.
    pub fn get(&self, id_or_path: &str) -> Result<QuarantineItem> {
        let index = self.list()?;
        let position = Self::position(&index, id_or_path)?;
        Ok(index[position].clone())
    }

    /// Total size of quarantined content.
    pub fn total_size(&self) -> Result<u64> {
        Ok(self.list()?.iter().map(|item| item.size).sum())
    }

    /// Index position of the newest item matching `key`.
    fn position(index: &[QuarantineItem], key: &str) -> Result<usize> {
        index
            .iter()
            .rposition(|item| item.matches(key))
            .ok_or_else(|| Error::QuarantineItemNotFound(key.to_string()))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.index_lock
            .lock()
            .map_err(|_| Error::lock_poisoned("quarantine index"))
    }

    fn read_index(&self) -> Result<Vec<QuarantineItem>> {
        let path = self.index_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::file_read(&path, e)),
        };
        serde_json::from_str(&contents)
            .map_err(|e| Error::Database(format!("Corrupt quarantine index {:?}: {}", path, e)))
    }

    fn write_index(&self, index: &[QuarantineItem]) -> Result<()> {
        let path = self.index_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(index)?)
            .map_err(|e| Error::file_write(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| Error::file_write(&path, e))
    }
}

/// Move a file, falling back to copy-verify-delete across filesystems.
fn safe_move(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::DirectoryAccess {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    // Fast path on the same filesystem
    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }

    fs::copy(source, dest).map_err(|e| Error::file_write(dest, e))?;

    let source_size = fs::metadata(source)
        .map_err(|e| Error::file_read(source, e))?
        .len();
    let dest_size = fs::metadata(dest)
        .map_err(|e| Error::file_read(dest, e))?
        .len();

    if source_size != dest_size {
        let _ = fs::remove_file(dest);
        return Err(Error::Internal("File copy verification failed".to_string()));
    }

    fs::remove_file(source).map_err(|e| Error::FileDelete {
        path: source.to_path_buf(),
        source: e,
    })
}
