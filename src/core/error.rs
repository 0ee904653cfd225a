//! Error types and result handling for Vigil.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Vigil operations.
#[derive(Error, Debug)]
pub enum Error {
    // ===== I/O Errors =====
    #[error("Failed to read file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete file: {path}")]
    FileDelete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to access directory: {path}")]
    DirectoryAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Permission denied: {path}")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ===== Configuration Errors =====
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(String),

    #[error("Failed to save configuration: {0}")]
    ConfigSave(String),

    #[error("Invalid configuration value: {field} - {message}")]
    ConfigInvalid { field: String, message: String },

    // ===== Signature Errors =====
    #[error("Signature database error: {0}")]
    Database(String),

    // ===== Quarantine Errors =====
    #[error("Failed to quarantine file: {path} - {reason}")]
    QuarantineFailed { path: PathBuf, reason: String },

    #[error("Failed to restore item {id}: {reason}")]
    RestoreFailed { id: String, reason: String },

    #[error("Quarantine item not found: {0}")]
    QuarantineItemNotFound(String),

    // ===== Network Errors =====
    #[error("Network error: {0}")]
    Network(String),

    #[error("Update failed: {0}")]
    UpdateFailed(String),

    #[error("Download failed: {url}")]
    DownloadFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Network request timed out after {timeout_secs}s: {operation}")]
    NetworkTimeout {
        operation: String,
        timeout_secs: u64,
    },

    // ===== Concurrency Errors =====
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    // ===== Serialization Errors =====
    #[error("JSON serialization error")]
    JsonSerialize(#[from] serde_json::Error),

    // ===== Generic Errors =====
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create a file read error, mapping permission failures to `PermissionDenied`.
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            std::io::ErrorKind::NotFound => Self::PathNotFound(path),
            _ => Self::FileRead { path, source },
        }
    }

    /// Create a file write error.
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Create a lock poisoned error.
    pub fn lock_poisoned(context: impl Into<String>) -> Self {
        Self::LockPoisoned {
            context: context.into(),
        }
    }

    /// Create a network timeout error.
    pub fn network_timeout(operation: impl Into<String>, timeout_secs: u64) -> Self {
        Self::NetworkTimeout {
            operation: operation.into(),
            timeout_secs,
        }
    }

    /// One-line report for the terminal, prefixed with the error category.
    pub fn report_line(&self) -> String {
        format!("{} error: {}", self.category(), self)
    }

    /// Get a user-friendly suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::PermissionDenied { .. } => {
                Some("Try running with elevated privileges (sudo/administrator)")
            }
            Error::PathNotFound(_) => Some("Check that the path exists and is accessible"),
            Error::ConfigLoad(_) | Error::ConfigInvalid { .. } => {
                Some("Check your configuration file for syntax errors or missing fields")
            }
            Error::Database(_) => {
                Some("Delete the signature cache and let it be rebuilt from the hash lists")
            }
            Error::NetworkTimeout { .. } | Error::Network(_) | Error::DownloadFailed { .. } => {
                Some("Check your network connection and the configured update URL")
            }
            Error::LockPoisoned { .. } => Some("Internal error: restart the application"),
            Error::QuarantineItemNotFound(_) => {
                Some("Run `vigil quarantine list` to see the available items")
            }
            _ => None,
        }
    }

    /// Get the error category shown in error reports.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::FileRead { .. }
            | Error::FileWrite { .. }
            | Error::FileDelete { .. }
            | Error::DirectoryAccess { .. }
            | Error::PathNotFound(_)
            | Error::PermissionDenied { .. }
            | Error::Io(_) => ErrorCategory::Io,

            Error::ConfigLoad(_) | Error::ConfigSave(_) | Error::ConfigInvalid { .. } => {
                ErrorCategory::Configuration
            }

            Error::Database(_) => ErrorCategory::Database,

            Error::QuarantineFailed { .. }
            | Error::RestoreFailed { .. }
            | Error::QuarantineItemNotFound(_) => ErrorCategory::Quarantine,

            Error::Network(_)
            | Error::UpdateFailed(_)
            | Error::DownloadFailed { .. }
            | Error::NetworkTimeout { .. } => ErrorCategory::Network,

            Error::LockPoisoned { .. } => ErrorCategory::Concurrency,

            Error::JsonSerialize(_) => ErrorCategory::Serialization,

            Error::Internal(_) => ErrorCategory::Other,
        }
    }
}

/// Error category for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Io,
    Configuration,
    Database,
    Quarantine,
    Network,
    Concurrency,
    Serialization,
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io => write!(f, "I/O"),
            Self::Configuration => write!(f, "Configuration"),
            Self::Database => write!(f, "Database"),
            Self::Quarantine => write!(f, "Quarantine"),
            Self::Network => write!(f, "Network"),
            Self::Concurrency => write!(f, "Concurrency"),
            Self::Serialization => write!(f, "Serialization"),
            Self::Other => write!(f, "Other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PathNotFound(PathBuf::from("/test/path"));
        assert_eq!(err.to_string(), "Path not found: /test/path");
    }

    #[test]
    fn test_lock_poisoned_category() {
        let err = Error::lock_poisoned("store");
        assert_eq!(err.category(), ErrorCategory::Concurrency);
        assert_eq!(err.category().to_string(), "Concurrency");
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_file_read_maps_kind() {
        let err = Error::file_read(
            "/secret",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, Error::PermissionDenied { .. }));
        assert!(err.suggestion().is_some());

        let err = Error::file_read(
            "/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, Error::PathNotFound(_)));
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn test_network_error_category() {
        let err = Error::network_timeout("signature update", 10);
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(
            err.to_string(),
            "Network request timed out after 10s: signature update"
        );
        assert_eq!(
            Error::UpdateFailed("x".into()).category(),
            ErrorCategory::Network
        );
    }

    #[test]
    fn test_report_line() {
        let err = Error::QuarantineItemNotFound("abc".into());
        assert_eq!(
            err.report_line(),
            "Quarantine error: Quarantine item not found: abc"
        );
    }
}
