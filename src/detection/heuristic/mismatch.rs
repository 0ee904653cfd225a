//! Extension versus detected content-type mismatch rules.

use super::{Finding, FindingCategory};

/// MIME fragments that mean "not plain text" for a `.txt` file.
const BINARY_MIME_MARKERS: &[&str] = &[
    "executable",
    "x-dosexec",
    "x-msdownload",
    "x-sharedlib",
    "x-mach-binary",
    "octet-stream",
];

/// MIME fragments accepted for `.exe` and `.dll` files.
const EXECUTABLE_MIME_MARKERS: &[&str] = &["executable", "x-msdownload", "x-dosexec"];

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// Whether an extension and a detected MIME type disagree.
///
/// `ext` is the lowercased extension without the dot.
pub fn is_mismatch(ext: &str, mime: &str) -> bool {
    let mime = mime.to_lowercase();
    match ext {
        "txt" => BINARY_MIME_MARKERS.iter().any(|m| mime.contains(m)),
        "exe" | "dll" => !EXECUTABLE_MIME_MARKERS.iter().any(|m| mime.contains(m)),
        e if IMAGE_EXTENSIONS.contains(&e) => !mime.starts_with("image/"),
        _ => false,
    }
}

/// Produce a finding when the rules flag a mismatch.
pub fn check(ext: &str, mime: &str) -> Option<Finding> {
    if is_mismatch(ext, mime) {
        Some(Finding::new(
            FindingCategory::ExtensionMismatch,
            format!("Extension mismatch: .{} but detected as {}", ext, mime),
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_holding_binary() {
        assert!(is_mismatch("txt", "application/x-dosexec"));
        assert!(is_mismatch("txt", "application/octet-stream"));
        assert!(!is_mismatch("txt", "text/plain"));
    }

    #[test]
    fn test_images() {
        assert!(is_mismatch("png", "text/plain"));
        assert!(is_mismatch("jpeg", "application/x-dosexec"));
        assert!(!is_mismatch("gif", "image/gif"));
        // A different image type is still an image
        assert!(!is_mismatch("jpg", "image/png"));
    }

    #[test]
    fn test_executables() {
        assert!(!is_mismatch("exe", "application/x-dosexec"));
        assert!(!is_mismatch("dll", "application/x-msdownload"));
        assert!(is_mismatch("exe", "text/plain"));
    }

    #[test]
    fn test_other_extensions_never_flagged() {
        assert!(!is_mismatch("pdf", "application/x-dosexec"));
        assert!(!is_mismatch("", "application/octet-stream"));
    }

    #[test]
    fn test_finding_text() {
        let finding = check("png", "text/plain").unwrap();
        assert_eq!(finding.category, FindingCategory::ExtensionMismatch);
        assert_eq!(
            finding.description,
            "Extension mismatch: .png but detected as text/plain"
        );
        assert!(check("png", "image/png").is_none());
    }
}
