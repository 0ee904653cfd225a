//! Configuration management for Vigil.
//!
//! Every path, threshold and URL the engine uses lives here and is handed to
//! each component at construction time.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scan-related settings
    pub scan: ScanConfig,
    /// Heuristic detection settings
    pub detection: DetectionConfig,
    /// Signature storage locations
    pub signatures: SignatureConfig,
    /// Signature update settings
    pub updates: UpdateConfig,
    /// Logging settings
    pub logging: LoggingConfig,
    /// Quarantine settings
    pub quarantine: QuarantineConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigSave(format!("Failed to write config file: {}", e)))
    }

    /// Load configuration from default location, or create default if not exists.
    pub fn load_or_default() -> Self {
        Self::load_or_default_from(&Self::default_config_path())
    }

    /// Load configuration from `config_path`, writing defaults there if it is missing.
    pub fn load_or_default_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match Self::load(config_path).and_then(|c| c.validate().map(|_| c)) {
                Ok(config) => return config,
                Err(e) => {
                    log::warn!("Failed to load config, using defaults: {}", e);
                    return Self::default();
                }
            }
        }

        let config = Self::default();

        if let Err(e) = config.save(config_path) {
            log::warn!("Failed to save default config: {}", e);
        }

        config
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        Self::data_dir().join("config.json")
    }

    /// Get the application data directory.
    pub fn data_dir() -> PathBuf {
        #[cfg(windows)]
        {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData"))
                .join("Vigil")
        }

        #[cfg(not(windows))]
        {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("vigil")
        }
    }

    /// Build a configuration whose every on-disk location lives under `root`.
    ///
    /// Used by tests and portable installs.
    pub fn rooted_at(root: &Path) -> Self {
        let mut config = Self::default();
        config.signatures = SignatureConfig {
            cache_path: Some(root.join("virus_definitions_cache.json")),
            md5_list_path: Some(root.join("md5_hashes.txt")),
            sha256_list_path: Some(root.join("sha256_hashes.txt")),
            marker_path: Some(root.join("last_updated.txt")),
        };
        config.logging.log_path = Some(root.join("logs"));
        config.quarantine.vault_path = Some(root.join("quarantine"));
        config
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.detection.entropy_threshold;
        if !(threshold > 0.0 && threshold <= 8.0) {
            return Err(Error::ConfigInvalid {
                field: "detection.entropy_threshold".to_string(),
                message: "Must be in the range (0, 8]".to_string(),
            });
        }

        if self.updates.timeout_secs == 0 {
            return Err(Error::ConfigInvalid {
                field: "updates.timeout_secs".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.scan.scan_threads == 0 {
            return Err(Error::ConfigInvalid {
                field: "scan.scan_threads".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Scan-related configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Whether to follow symbolic links during directory scans
    pub follow_symlinks: bool,
    /// Number of parallel scan workers
    pub scan_threads: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            scan_threads: num_cpus(),
        }
    }
}

/// Which content-type sniffer backs the extension mismatch check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnifferKind {
    /// Use `file` if it is installed, otherwise in-process magic bytes
    Auto,
    /// Always shell out to `file --mime-type`
    File,
    /// In-process magic byte detection
    Magic,
    /// Guess from the extension only
    Extension,
}

/// Heuristic detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Files above this Shannon entropy (0-8) are flagged
    pub entropy_threshold: f64,
    /// Content-type sniffer selection
    pub sniffer: SnifferKind,
    /// Keep running heuristics after a signature hit so reports stay complete
    pub heuristics_on_signature_hit: bool,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            entropy_threshold: 7.0,
            sniffer: SnifferKind::Auto,
            heuristics_on_signature_hit: true,
        }
    }
}

/// Signature storage locations. `None` means "under the data directory".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// JSON snapshot of the full database
    pub cache_path: Option<PathBuf>,
    /// Flat MD5 hash list
    pub md5_list_path: Option<PathBuf>,
    /// Flat SHA256 hash list
    pub sha256_list_path: Option<PathBuf>,
    /// Plain-text last-updated marker
    pub marker_path: Option<PathBuf>,
}

impl SignatureConfig {
    pub fn cache_file(&self) -> PathBuf {
        self.cache_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("virus_definitions_cache.json"))
    }

    pub fn md5_list_file(&self) -> PathBuf {
        self.md5_list_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("md5_hashes.txt"))
    }

    pub fn sha256_list_file(&self) -> PathBuf {
        self.sha256_list_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("sha256_hashes.txt"))
    }

    pub fn marker_file(&self) -> PathBuf {
        self.marker_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("last_updated.txt"))
    }
}

/// Signature update configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// URL serving a database document in the snapshot format
    pub update_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Try a non-forced update every time the CLI starts
    pub check_on_startup: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            update_url: "http://localhost:8000/online_definitions_with_meta.json".to_string(),
            timeout_secs: 10,
            check_on_startup: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Directory for the audit log files
    pub log_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_path: None,
        }
    }
}

impl LoggingConfig {
    /// Get the effective log directory.
    pub fn log_dir(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("logs"))
    }
}

/// Quarantine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuarantineConfig {
    /// Path for quarantine vault
    pub vault_path: Option<PathBuf>,
}

impl QuarantineConfig {
    /// Get the effective quarantine directory.
    pub fn quarantine_dir(&self) -> PathBuf {
        self.vault_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("quarantine"))
    }
}

/// Get the number of CPUs, with a reasonable default.
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
