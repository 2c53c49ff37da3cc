//! Upload acceptance policy: extension whitelist and size cap.

use crate::error::RejectReason;

/// Largest file accepted for upload (100 MiB)
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Extensions the detection service can ingest
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "docx", "doc", "xlsx", "xls", "png", "jpg", "jpeg", "zip",
];

/// Lowercased trailing dot-segment of a file name (empty when there is none)
pub fn extension_of(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => String::new(),
    }
}

/// Check if an extension (any case) is on the whitelist
pub fn is_allowed_extension(ext: &str) -> bool {
    let ext = ext.to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str())
}

/// Apply the whitelist, then the size cap
pub fn check(name: &str, byte_size: u64) -> Result<String, RejectReason> {
    let ext = extension_of(name);
    if !is_allowed_extension(&ext) {
        return Err(RejectReason::UnsupportedType);
    }
    if byte_size > MAX_FILE_SIZE {
        return Err(RejectReason::TooLarge);
    }
    Ok(ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("record.PDF"), "pdf");
        assert_eq!(extension_of("scan.final.jpeg"), "jpeg");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn test_is_allowed_extension() {
        for ext in ALLOWED_EXTENSIONS {
            assert!(is_allowed_extension(ext));
        }
        assert!(is_allowed_extension("DOCX"));
        assert!(!is_allowed_extension("exe"));
        assert!(!is_allowed_extension("txt"));
        assert!(!is_allowed_extension(""));
    }

    #[test]
    fn test_size_cap_is_inclusive() {
        assert_eq!(check("big.zip", MAX_FILE_SIZE), Ok("zip".to_string()));
        assert_eq!(check("big.zip", MAX_FILE_SIZE + 1), Err(RejectReason::TooLarge));
    }

    #[test]
    fn test_type_is_checked_before_size() {
        assert_eq!(
            check("huge.exe", MAX_FILE_SIZE * 2),
            Err(RejectReason::UnsupportedType)
        );
    }
}
