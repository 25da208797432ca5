// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Upload validation: field presence, filename, extension allowlist, size

use crate::api::errors::ApiError;

/// Extensions accepted for upload (matched case-insensitively)
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "tiff"];

/// Validate an uploaded image part and return its canonical (lowercase)
/// extension.
///
/// Checks, in order: a filename is present and non-empty, the extension is in
/// the allowlist, and the payload does not exceed `max_bytes`. Produces the
/// tagged [`ApiError`] identifying the first failed check; no side effects.
pub fn validate_upload(
    filename: Option<&str>,
    payload_len: usize,
    max_bytes: usize,
) -> Result<String, ApiError> {
    let filename = match filename {
        Some(name) if !name.is_empty() => name,
        _ => return Err(ApiError::EmptyFilename),
    };

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::UnsupportedExtension { extension });
    }

    if payload_len > max_bytes {
        return Err(ApiError::PayloadTooLarge { limit: max_bytes });
    }

    Ok(extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 16 * 1024 * 1024;

    #[test]
    fn test_valid_filenames() {
        for name in ["scan.png", "photo.jpg", "page.jpeg", "anim.gif", "old.bmp", "doc.tiff"] {
            let ext = validate_upload(Some(name), 100, MAX).unwrap();
            assert_eq!(ext, name.rsplit_once('.').unwrap().1);
        }
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        assert_eq!(validate_upload(Some("SCAN.PNG"), 100, MAX).unwrap(), "png");
        assert_eq!(validate_upload(Some("Photo.Jpg"), 100, MAX).unwrap(), "jpg");
    }

    #[test]
    fn test_missing_filename() {
        assert_eq!(
            validate_upload(None, 100, MAX).unwrap_err(),
            ApiError::EmptyFilename
        );
    }

    #[test]
    fn test_empty_filename() {
        assert_eq!(
            validate_upload(Some(""), 100, MAX).unwrap_err(),
            ApiError::EmptyFilename
        );
    }

    #[test]
    fn test_disallowed_extension() {
        let err = validate_upload(Some("notes.txt"), 100, MAX).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedExtension { .. }));
    }

    #[test]
    fn test_no_extension_is_disallowed() {
        let err = validate_upload(Some("README"), 100, MAX).unwrap_err();
        assert!(matches!(err, ApiError::UnsupportedExtension { .. }));
    }

    #[test]
    fn test_only_final_extension_counts() {
        // .tar.gz resolves to "gz", which is not allowed
        let err = validate_upload(Some("archive.tar.gz"), 100, MAX).unwrap_err();
        assert!(matches!(
            err,
            ApiError::UnsupportedExtension { extension } if extension == "gz"
        ));
    }

    #[test]
    fn test_oversized_payload() {
        let err = validate_upload(Some("scan.png"), MAX + 1, MAX).unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge { .. }));
    }

    #[test]
    fn test_payload_at_limit_is_accepted() {
        assert!(validate_upload(Some("scan.png"), MAX, MAX).is_ok());
    }

    #[test]
    fn test_traversal_sequences_never_reach_storage() {
        // The returned value is only the vetted extension; the rest of the
        // client filename is discarded by the caller.
        let ext = validate_upload(Some("../../etc/passwd.png"), 100, MAX).unwrap();
        assert_eq!(ext, "png");
    }
}
