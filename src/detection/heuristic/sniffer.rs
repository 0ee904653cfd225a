//! Content-type sniffing behind a common interface.
//!
//! The extension mismatch check only sees [`ContentTypeSniffer`]; which
//! implementation backs it is decided once at startup from the config.

use crate::core::config::SnifferKind;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::process::Command;

/// Bytes read for magic detection.
const MAGIC_BYTES_SIZE: usize = 512;

/// Determines a MIME type for a file.
pub trait ContentTypeSniffer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Detect the MIME type. `Ok(None)` means the type is unknown.
    fn sniff(&self, path: &Path) -> std::io::Result<Option<String>>;
}

/// Pick a sniffer implementation for the configured kind.
pub fn select_sniffer(kind: SnifferKind) -> Box<dyn ContentTypeSniffer> {
    let sniffer: Box<dyn ContentTypeSniffer> = match kind {
        SnifferKind::File => Box::new(FileCommandSniffer::new()),
        SnifferKind::Magic => Box::new(MagicSniffer),
        SnifferKind::Extension => Box::new(ExtensionSniffer),
        SnifferKind::Auto => {
            if FileCommandSniffer::is_available() {
                Box::new(FileCommandSniffer::new())
            } else {
                Box::new(MagicSniffer)
            }
        }
    };
    log::debug!("Using {} content-type sniffer", sniffer.name());
    sniffer
}

/// Weak guess from the file extension alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtensionSniffer;

impl ExtensionSniffer {
    /// MIME type registered for the path's extension, if any.
    pub fn guess(path: &Path) -> Option<&'static str> {
        mime_guess::from_path(path).first_raw()
    }
}

impl ContentTypeSniffer for ExtensionSniffer {
    fn name(&self) -> &'static str {
        "extension"
    }

    fn sniff(&self, path: &Path) -> std::io::Result<Option<String>> {
        Ok(Self::guess(path).map(str::to_string))
    }
}

/// Shells out to `file -b --mime-type`, falling back to the extension guess
/// when the tool is missing or cannot classify the file.
#[derive(Debug, Clone)]
pub struct FileCommandSniffer {
    program: String,
}

impl Default for FileCommandSniffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FileCommandSniffer {
    pub fn new() -> Self {
        Self {
            program: "file".to_string(),
        }
    }

    /// Use a different executable (e.g. a bundled `file` build).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Whether the default `file` tool runs on this system.
    pub fn is_available() -> bool {
        Command::new("file")
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    }
}

impl ContentTypeSniffer for FileCommandSniffer {
    fn name(&self) -> &'static str {
        "file-command"
    }

    fn sniff(&self, path: &Path) -> std::io::Result<Option<String>> {
        // `file` reports unreadable paths on stdout with a zero exit code, so
        // surface access errors ourselves.
        File::open(path)?;

        let output = Command::new(&self.program)
            .args(["-b", "--mime-type"])
            .arg(path)
            .output();

        match output {
            Ok(out) if out.status.success() => {
                let mime = String::from_utf8_lossy(&out.stdout).trim().to_string();
                if mime.contains('/') {
                    return Ok(Some(mime));
                }
                log::debug!("`{}` gave no MIME type for {:?}: {}", self.program, path, mime);
            }
            Ok(out) => log::debug!(
                "`{}` exited with {} for {:?}",
                self.program,
                out.status,
                path
            ),
            Err(e) => log::debug!("Could not run `{}`: {}", self.program, e),
        }

        ExtensionSniffer.sniff(path)
    }
}

/// In-process detection from leading magic bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MagicSniffer;

impl MagicSniffer {
    /// Detect a MIME type from the first bytes of a file.
    pub fn detect_from_bytes(bytes: &[u8]) -> &'static str {
        if bytes.is_empty() {
            return "application/x-empty";
        }

        // PE executable (MZ header)
        if bytes.starts_with(b"MZ") {
            return "application/x-dosexec";
        }

        if bytes.starts_with(b"\x7fELF") {
            return "application/x-executable";
        }

        // Mach-O binary (various magic numbers)
        if bytes.len() >= 4 {
            let magic = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            if matches!(magic, 0xFEEDFACE | 0xFEEDFACF | 0xCEFAEDFE | 0xCFFAEDFE) {
                return "application/x-mach-binary";
            }
        }

        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            return "image/png";
        }

        if bytes.starts_with(b"\xff\xd8\xff") {
            return "image/jpeg";
        }

        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return "image/gif";
        }

        // BMP: "BM" followed by a size and four zero reserved bytes
        if bytes.len() >= 14 && bytes.starts_with(b"BM") && bytes[6..10] == [0, 0, 0, 0] {
            return "image/bmp";
        }

        if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
            return "application/zip";
        }

        if bytes.starts_with(b"Rar!\x1a\x07") {
            return "application/vnd.rar";
        }

        if bytes.starts_with(b"7z\xbc\xaf\x27\x1c") {
            return "application/x-7z-compressed";
        }

        if bytes.starts_with(b"\x1f\x8b") {
            return "application/gzip";
        }

        if bytes.starts_with(b"%PDF") {
            return "application/pdf";
        }

        // OLE Compound Document (legacy Office, MSI)
        if bytes.starts_with(b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1") {
            return "application/x-ole-storage";
        }

        if bytes.starts_with(b"#!") {
            return "text/x-shellscript";
        }

        if bytes.starts_with(b"<?xml") || bytes.starts_with(b"\xef\xbb\xbf<?xml") {
            return "text/xml";
        }

        if Self::is_likely_text(bytes) {
            return "text/plain";
        }

        "application/octet-stream"
    }

    /// Check if bytes are likely text (not binary).
    fn is_likely_text(bytes: &[u8]) -> bool {
        let non_text_count = bytes
            .iter()
            .filter(|&&b| !(b == 9 || b == 10 || b == 12 || b == 13 || (32..=126).contains(&b) || b >= 128))
            .count();

        // More than 10% control bytes means binary
        (non_text_count as f64 / bytes.len() as f64) < 0.1
    }
}

impl ContentTypeSniffer for MagicSniffer {
    fn name(&self) -> &'static str {
        "magic"
    }

    fn sniff(&self, path: &Path) -> std::io::Result<Option<String>> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::with_capacity(MAGIC_BYTES_SIZE);
        file.by_ref()
            .take(MAGIC_BYTES_SIZE as u64)
            .read_to_end(&mut buffer)?;
        Ok(Some(Self::detect_from_bytes(&buffer).to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_magic_detection() {
        assert_eq!(
            MagicSniffer::detect_from_bytes(b"MZ\x90\x00\x03\x00\x00\x00"),
            "application/x-dosexec"
        );
        assert_eq!(
            MagicSniffer::detect_from_bytes(b"\x7fELF\x02\x01\x01\x00"),
            "application/x-executable"
        );
        assert_eq!(
            MagicSniffer::detect_from_bytes(b"\x89PNG\r\n\x1a\n\x00\x00"),
            "image/png"
        );
        assert_eq!(
            MagicSniffer::detect_from_bytes(b"PK\x03\x04\x14\x00"),
            "application/zip"
        );
        assert_eq!(MagicSniffer::detect_from_bytes(b"hello world\n"), "text/plain");
        assert_eq!(
            MagicSniffer::detect_from_bytes(&[0u8, 1, 2, 3, 4, 5, 6, 7]),
            "application/octet-stream"
        );
        assert_eq!(MagicSniffer::detect_from_bytes(b""), "application/x-empty");
    }

    #[test]
    fn test_bmp_needs_reserved_zeroes() {
        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&[0x36, 0, 0, 0, 0, 0, 0, 0, 0x36, 0, 0, 0]);
        assert_eq!(MagicSniffer::detect_from_bytes(&bmp), "image/bmp");
        assert_eq!(
            MagicSniffer::detect_from_bytes(b"BMW owners manual, chapter one"),
            "text/plain"
        );
    }

    #[test]
    fn test_magic_sniffer_reads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fake.png");
        std::fs::write(&path, b"just some text").unwrap();
        assert_eq!(
            MagicSniffer.sniff(&path).unwrap().as_deref(),
            Some("text/plain")
        );
        assert!(MagicSniffer.sniff(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_extension_sniffer() {
        assert_eq!(
            ExtensionSniffer.sniff(Path::new("notes.txt")).unwrap().as_deref(),
            Some("text/plain")
        );
        assert_eq!(
            ExtensionSniffer.sniff(Path::new("photo.png")).unwrap().as_deref(),
            Some("image/png")
        );
        assert_eq!(ExtensionSniffer.sniff(Path::new("no_extension")).unwrap(), None);
    }

    #[test]
    fn test_file_command_falls_back_to_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("readme.txt");
        std::fs::write(&path, b"plain").unwrap();

        let sniffer = FileCommandSniffer::with_program("vigil-no-such-file-tool");
        assert_eq!(sniffer.sniff(&path).unwrap().as_deref(), Some("text/plain"));
    }

    #[test]
    fn test_file_command_reports_missing_file() {
        let sniffer = FileCommandSniffer::new();
        assert!(sniffer.sniff(Path::new("/no/such/file.txt")).is_err());
    }

    #[test]
    fn test_select_sniffer_kinds() {
        assert_eq!(select_sniffer(SnifferKind::Magic).name(), "magic");
        assert_eq!(select_sniffer(SnifferKind::Extension).name(), "extension");
        assert_eq!(select_sniffer(SnifferKind::File).name(), "file-command");
        let auto = select_sniffer(SnifferKind::Auto).name();
        assert!(auto == "file-command" || auto == "magic");
    }
}
