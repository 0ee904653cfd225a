//! Persistent audit trail of scan results and system events.
//!
//! Entries are appended as JSON lines to two files in the log directory:
//! `scan_history.log` and `system_events.log`. Writing is best effort; a
//! failed append is reported through `log` and never interrupts the caller.

use crate::core::config::LoggingConfig;
use crate::core::error::{Error, Result};
use crate::core::types::{ScanReport, ScanStatus};
use chrono::Local;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// File name of the scan history log.
pub const SCAN_LOG_FILE: &str = "scan_history.log";

/// File name of the system event log.
pub const EVENT_LOG_FILE: &str = "system_events.log";

/// Discriminator stored in every entry's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    ScanResult,
    SystemEvent,
}

/// Severity of a system event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventLevel {
    #[default]
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventLevel::Info => write!(f, "INFO"),
            EventLevel::Warning => write!(f, "WARNING"),
            EventLevel::Error => write!(f, "ERROR"),
        }
    }
}

/// One line of the scan history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub filepath: String,
    pub status: ScanStatus,
    pub threat: Option<String>,
    #[serde(default)]
    pub heuristics: Vec<String>,
}

impl ScanEntry {
    pub fn from_report(report: &ScanReport) -> Self {
        Self {
            timestamp: now(),
            entry_type: EntryType::ScanResult,
            filepath: report.path.display().to_string(),
            status: report.status,
            threat: report.threat_name.clone(),
            heuristics: report.findings.clone(),
        }
    }
}

/// One line of the system event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    #[serde(default)]
    pub level: EventLevel,
    pub description: String,
}

impl EventEntry {
    pub fn new(level: EventLevel, description: impl Into<String>) -> Self {
        Self {
            timestamp: now(),
            entry_type: EntryType::SystemEvent,
            level,
            description: description.into(),
        }
    }
}

fn now() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    /// Record the outcome of one scan.
    fn record_scan(&self, report: &ScanReport);

    /// Record a system event.
    fn record_event(&self, level: EventLevel, description: &str);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAudit;

impl AuditSink for NullAudit {
    fn record_scan(&self, _report: &ScanReport) {}

    fn record_event(&self, _level: EventLevel, _description: &str) {}
}

/// Appends JSON lines to the scan history and event log files.
#[derive(Debug)]
pub struct JsonLineAudit {
    scan_log: PathBuf,
    event_log: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLineAudit {
    /// Audit files inside `dir`. The directory is created on first write.
    pub fn new(dir: &Path) -> Self {
        Self {
            scan_log: dir.join(SCAN_LOG_FILE),
            event_log: dir.join(EVENT_LOG_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self::new(&config.log_dir())
    }

    pub fn scan_log_path(&self) -> &Path {
        &self.scan_log
    }

    pub fn event_log_path(&self) -> &Path {
        &self.event_log
    }

    /// All readable scan history entries, oldest first.
    pub fn scan_history(&self) -> Result<Vec<ScanEntry>> {
        read_scan_history(&self.scan_log)
    }

    /// All readable system events, oldest first.
    pub fn events(&self) -> Result<Vec<EventEntry>> {
        read_events(&self.event_log)
    }

    fn append<T: Serialize>(&self, path: &Path, entry: &T) -> Result<()> {
        let line = serde_json::to_string(entry)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| Error::lock_poisoned("audit log"))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::DirectoryAccess {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| Error::file_write(path, e))?;
        writeln!(file, "{}", line).map_err(|e| Error::file_write(path, e))
    }
}

impl AuditSink for JsonLineAudit {
    fn record_scan(&self, report: &ScanReport) {
        if let Err(e) = self.append(&self.scan_log, &ScanEntry::from_report(report)) {
            log::error!("Failed to record scan result: {}", e);
        }
    }

    fn record_event(&self, level: EventLevel, description: &str) {
        if let Err(e) = self.append(&self.event_log, &EventEntry::new(level, description)) {
            log::error!("Failed to record system event: {}", e);
        }
    }
}

/// Read a scan history file. A missing file is an empty history.
pub fn read_scan_history(path: &Path) -> Result<Vec<ScanEntry>> {
    read_json_lines(path)
}

/// Read a system event file. A missing file means no events.
pub fn read_events(path: &Path) -> Result<Vec<EventEntry>> {
    read_json_lines(path)
}

fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::file_read(path, e)),
    };

    let mut entries = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| Error::file_read(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => log::warn!("Skipping malformed line {} in {:?}: {}", index + 1, path, e),
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn report(status: ScanStatus, threat: Option<&str>, findings: &[&str]) -> ScanReport {
        ScanReport::new(
            Path::new("/tmp/sample.txt"),
            status,
            threat.map(str::to_string),
            findings.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn test_scan_entries_round_trip() {
        let dir = tempdir().unwrap();
        let audit = JsonLineAudit::new(&dir.path().join("logs"));

        audit.record_scan(&report(ScanStatus::Clean, None, &[]));
        audit.record_scan(&report(
            ScanStatus::HeuristicDetected,
            Some("Heuristic.Suspicious (1 finding(s): keyword)"),
            &["Suspicious keywords: curl "],
        ));

        let history = audit.scan_history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, ScanStatus::Clean);
        assert_eq!(history[0].threat, None);
        assert_eq!(history[1].entry_type, EntryType::ScanResult);
        assert_eq!(history[1].filepath, "/tmp/sample.txt");
        assert_eq!(history[1].heuristics, vec!["Suspicious keywords: curl "]);
    }

    #[test]
    fn test_wire_format() {
        let dir = tempdir().unwrap();
        let audit = JsonLineAudit::new(dir.path());
        audit.record_scan(&report(ScanStatus::Infected, Some("EICAR-Test-File"), &[]));
        audit.record_event(EventLevel::Warning, "Update skipped");

        let scan_line = std::fs::read_to_string(audit.scan_log_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(scan_line.trim()).unwrap();
        assert_eq!(value["type"], "SCAN_RESULT");
        assert_eq!(value["status"], "INFECTED");
        assert_eq!(value["threat"], "EICAR-Test-File");
        assert!(value["heuristics"].as_array().unwrap().is_empty());

        let event_line = std::fs::read_to_string(audit.event_log_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(event_line.trim()).unwrap();
        assert_eq!(value["type"], "SYSTEM_EVENT");
        assert_eq!(value["level"], "WARNING");
        assert_eq!(value["description"], "Update skipped");
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(EVENT_LOG_FILE);
        std::fs::write(
            &path,
            concat!(
                "{\"timestamp\":\"t1\",\"type\":\"SYSTEM_EVENT\",\"description\":\"started\"}\n",
                "not json at all\n",
                "\n",
                "{\"timestamp\":\"t2\",\"type\":\"SYSTEM_EVENT\",\"level\":\"ERROR\",\"description\":\"failed\"}\n"
            ),
        )
        .unwrap();

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].level, EventLevel::Info);
        assert_eq!(events[1].level, EventLevel::Error);
    }

    #[test]
    fn test_missing_files_are_empty() {
        let dir = tempdir().unwrap();
        let audit = JsonLineAudit::new(&dir.path().join("never-created"));
        assert!(audit.scan_history().unwrap().is_empty());
        assert!(audit.events().unwrap().is_empty());
    }

    #[test]
    fn test_write_failure_does_not_panic() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file-not-dir");
        std::fs::write(&blocker, "x").unwrap();

        let audit = JsonLineAudit::new(&blocker);
        audit.record_event(EventLevel::Info, "goes nowhere");
        audit.record_scan(&report(ScanStatus::Clean, None, &[]));
    }

    #[test]
    fn test_null_audit() {
        let sink: Box<dyn AuditSink> = Box::new(NullAudit);
        sink.record_event(EventLevel::Info, "ignored");
        sink.record_scan(&report(ScanStatus::Clean, None, &[]));
    }
}
