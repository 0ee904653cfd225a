//! Core type definitions used throughout Vigil.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Verdict assigned to a scanned path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    /// No signature hit and no heuristic findings
    Clean,
    /// Content hash matched a stored signature
    Infected,
    /// No signature hit, but at least one heuristic finding
    HeuristicDetected,
    /// Path does not exist
    NotFound,
    /// Path exists but is not a regular file
    NotFile,
    /// The file could not be classified
    Error,
}

impl ScanStatus {
    /// Whether this verdict calls for quarantine/attention.
    pub fn is_detection(&self) -> bool {
        matches!(self, ScanStatus::Infected | ScanStatus::HeuristicDetected)
    }

    /// Wire/log representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Clean => "CLEAN",
            ScanStatus::Infected => "INFECTED",
            ScanStatus::HeuristicDetected => "HEURISTIC_DETECTED",
            ScanStatus::NotFound => "NOT_FOUND",
            ScanStatus::NotFile => "NOT_FILE",
            ScanStatus::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of scanning a single path.
///
/// Built once by the classifier and never mutated afterwards; the audit log,
/// the console and the quarantine vault only read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Scanned path
    pub path: PathBuf,
    /// Final verdict
    pub status: ScanStatus,
    /// Threat name, heuristic label, or error description
    pub threat_name: Option<String>,
    /// Heuristic findings in entropy, keyword, mismatch order
    pub findings: Vec<String>,
}

impl ScanReport {
    pub(crate) fn new(
        path: &Path,
        status: ScanStatus,
        threat_name: Option<String>,
        findings: Vec<String>,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            status,
            threat_name,
            findings,
        }
    }

    pub(crate) fn not_found(path: &Path) -> Self {
        Self::new(path, ScanStatus::NotFound, None, Vec::new())
    }

    pub(crate) fn not_file(path: &Path) -> Self {
        Self::new(path, ScanStatus::NotFile, None, Vec::new())
    }

    pub(crate) fn error(path: &Path, reason: impl Into<String>) -> Self {
        Self::new(path, ScanStatus::Error, Some(reason.into()), Vec::new())
    }
}

/// Aggregate counts over a set of reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanTally {
    pub scanned: usize,
    pub infected: usize,
    pub heuristic: usize,
    pub errors: usize,
}

impl ScanTally {
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a ScanReport>) -> Self {
        let mut tally = Self::default();
        for report in reports {
            tally.scanned += 1;
            match report.status {
                ScanStatus::Infected => tally.infected += 1,
                ScanStatus::HeuristicDetected => tally.heuristic += 1,
                ScanStatus::Error => tally.errors += 1,
                _ => {}
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ScanStatus::HeuristicDetected).unwrap();
        assert_eq!(json, "\"HEURISTIC_DETECTED\"");
        let parsed: ScanStatus = serde_json::from_str("\"NOT_FILE\"").unwrap();
        assert_eq!(parsed, ScanStatus::NotFile);
    }

    #[test]
    fn test_detection_statuses() {
        assert!(ScanStatus::Infected.is_detection());
        assert!(ScanStatus::HeuristicDetected.is_detection());
        assert!(!ScanStatus::Clean.is_detection());
        assert!(!ScanStatus::Error.is_detection());
    }

    #[test]
    fn test_tally() {
        let reports = vec![
            ScanReport::new(Path::new("a"), ScanStatus::Infected, Some("X".into()), vec![]),
            ScanReport::new(Path::new("b"), ScanStatus::Clean, None, vec![]),
            ScanReport::error(Path::new("c"), "boom"),
        ];
        let tally = ScanTally::from_reports(&reports);
        assert_eq!(tally.scanned, 3);
        assert_eq!(tally.infected, 1);
        assert_eq!(tally.heuristic, 0);
        assert_eq!(tally.errors, 1);
    }
}
