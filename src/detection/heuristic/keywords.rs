//! Suspicious keyword search.
//!
//! Which keyword set applies depends on the kind of file. Scripts are checked
//! for download/eval idioms and executables for process-injection APIs. Every
//! file that is not an executable is also checked for embedded executable
//! headers.

use super::sniffer::ExtensionSniffer;
use super::{Finding, FindingCategory};
use std::path::Path;

/// Extensions treated as native executables.
pub const EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "dll", "sys", "scr", "com", "msi"];

/// Extensions treated as scripts.
pub const SCRIPT_EXTENSIONS: &[&str] = &[
    "ps1", "psm1", "sh", "bash", "bat", "cmd", "js", "vbs", "vbe", "hta", "py", "pl", "php",
];

/// Keywords searched for in scripts.
pub const SCRIPT_KEYWORDS: &[&str] = &[
    "eval(",
    "exec(",
    "base64",
    "powershell",
    "cmd.exe",
    "/bin/bash",
    "wget ",
    "curl ",
    "system(",
    "chown ",
    "chmod ",
    "rm -rf",
    "mshta",
    "regsvr32",
    "rundll32",
];

/// API names searched for in executables.
pub const EXECUTABLE_KEYWORDS: &[&str] = &[
    "VirtualAlloc",
    "WriteProcessMemory",
    "CreateRemoteThread",
    "LoadLibrary",
    "GetProcAddress",
];

/// Executable headers that should not appear in other files, with the label
/// used when reporting them.
pub const GENERAL_MARKERS: &[(&str, &str)] = &[
    ("\u{7f}ELF", "ELF header"),
    ("MZ\u{90}\u{0}", "MZ header"),
    ("This program cannot be run in DOS mode", "DOS stub"),
];

/// Which keyword set a file is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Executable,
    Script,
    Other,
}

impl FileClass {
    /// Classify a path by extension, then by its extension-based MIME guess.
    pub fn of(path: &Path) -> Self {
        let ext = extension_lower(path);
        if EXECUTABLE_EXTENSIONS.contains(&ext.as_str()) {
            return FileClass::Executable;
        }
        if SCRIPT_EXTENSIONS.contains(&ext.as_str()) {
            return FileClass::Script;
        }

        match ExtensionSniffer::guess(path) {
            Some(mime)
                if mime.contains("executable")
                    || mime.contains("x-msdownload")
                    || mime.contains("x-dosexec") =>
            {
                FileClass::Executable
            }
            Some(mime) if mime.contains("script") || mime.starts_with("text/") => {
                FileClass::Script
            }
            _ => FileClass::Other,
        }
    }
}

/// Lowercased extension without the dot, or an empty string.
pub(crate) fn extension_lower(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

/// Decode file bytes for searching: UTF-8 when valid, otherwise one char per
/// byte (Latin-1). The result is lowercased.
pub fn decode_content(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_lowercase(),
        Err(_) => data.iter().map(|&b| b as char).collect::<String>().to_lowercase(),
    }
}

#[derive(Debug, Clone)]
struct Needle {
    /// Lowercased search text
    pattern: String,
    /// Text reported in the finding
    label: String,
}

/// Case-insensitive keyword search over file content.
#[derive(Debug, Clone)]
pub struct KeywordScanner {
    script: Vec<Needle>,
    executable: Vec<Needle>,
    general: Vec<Needle>,
}

impl Default for KeywordScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl KeywordScanner {
    pub fn new() -> Self {
        let plain = |words: &[&str]| {
            words
                .iter()
                .map(|w| Needle {
                    pattern: w.to_lowercase(),
                    label: w.to_string(),
                })
                .collect::<Vec<_>>()
        };

        Self {
            script: plain(SCRIPT_KEYWORDS),
            executable: plain(EXECUTABLE_KEYWORDS),
            general: GENERAL_MARKERS
                .iter()
                .map(|(marker, name)| Needle {
                    pattern: marker.to_lowercase(),
                    label: format!("'{}' in non-executable", name),
                })
                .collect(),
        }
    }

    /// Needle sets applied to a class, in reporting order.
    fn needle_sets(&self, class: FileClass) -> Vec<&[Needle]> {
        match class {
            FileClass::Script => vec![self.script.as_slice(), self.general.as_slice()],
            FileClass::Executable => vec![self.executable.as_slice()],
            FileClass::Other => vec![self.general.as_slice()],
        }
    }

    /// Matched keyword labels, in keyword-list order without duplicates.
    pub fn matches(&self, data: &[u8], class: FileClass) -> Vec<String> {
        let content = decode_content(data);
        let mut found: Vec<String> = Vec::new();
        for needle in self.needle_sets(class).into_iter().flatten() {
            if content.contains(&needle.pattern) && !found.contains(&needle.label) {
                found.push(needle.label.clone());
            }
        }
        found
    }

    /// Run the check on already-read content.
    pub fn check(&self, data: &[u8], class: FileClass) -> Option<Finding> {
        let found = self.matches(data, class);
        if found.is_empty() {
            return None;
        }
        Some(Finding::new(
            FindingCategory::Keyword,
            format!("Suspicious keywords: {}", found.join(", ")),
        ))
    }
}
