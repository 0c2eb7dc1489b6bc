//! Path and filename validation for backup operations
//!
//! Pure functions enforcing security and well-formedness of backup
//! locations and artifact filenames. Every violation is rejected with a
//! descriptive reason before any filesystem call is made.
//!
//! The directory confinement check is a hard security boundary: no
//! configuration value, malicious or accidental, may steer backups or
//! restores outside the application's private data root.

use std::path::{Component, Path, PathBuf};

use crate::error::{VaultError, VaultResult};

/// Characters never allowed in a backup location, on any platform
const ILLEGAL_PATH_CHARS: &[char] = &['<', '>', '"', '|', '?', '*', '\0'];

/// Validate a configured backup location against the application data root
///
/// The location must be non-empty, absolute, already normalized (no `.` or
/// `..` segments), free of illegal characters, and nested strictly under
/// `data_root`.
pub fn validate_backup_location(location: &Path, data_root: &Path) -> VaultResult<()> {
    if location.as_os_str().is_empty() {
        return Err(VaultError::Validation(
            "Backup location must not be empty".into(),
        ));
    }

    if !location.is_absolute() {
        return Err(VaultError::Validation(format!(
            "Backup location must be an absolute path: {}",
            location.display()
        )));
    }

    // Re-normalizing must not change the path. This catches `.` and `..`
    // segments without touching the filesystem.
    if normalize_path(location) != location {
        return Err(VaultError::Validation(format!(
            "Backup location must be a normalized path: {}",
            location.display()
        )));
    }

    let text = location.to_string_lossy();
    if let Some(ch) = text.chars().find(|c| ILLEGAL_PATH_CHARS.contains(c)) {
        return Err(VaultError::Validation(format!(
            "Backup location contains illegal character {:?}: {}",
            ch,
            location.display()
        )));
    }

    if location == data_root || !location.starts_with(data_root) {
        return Err(VaultError::Validation(format!(
            "Backup location must be inside the application data directory: {}",
            location.display()
        )));
    }

    Ok(())
}

/// Validate a backup artifact filename
///
/// Accepts `backup-<digits>.json` and `backup-<digits>-<id>.json` where
/// `<id>` is alphanumeric plus `-` and `_`. Path separators and `..`
/// sequences are rejected outright.
pub fn validate_backup_filename(filename: &str) -> VaultResult<()> {
    if filename.is_empty() {
        return Err(VaultError::Validation(
            "Backup filename must not be empty".into(),
        ));
    }

    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(VaultError::Validation(format!(
            "Backup filename must not contain path separators: {}",
            filename
        )));
    }

    if parse_backup_filename(filename).is_none() {
        return Err(VaultError::Validation(format!(
            "Not a recognized backup filename: {}",
            filename
        )));
    }

    Ok(())
}

/// Build the canonical artifact filename for a backup
pub fn backup_filename(timestamp_ms: i64, backup_id: &str) -> String {
    format!("backup-{}-{}.json", timestamp_ms, backup_id)
}

/// Build the filename used by releases that predate backup ids
///
/// History reconciliation uses this to match legacy entries that only
/// stored a timestamp.
pub fn legacy_backup_filename(timestamp_ms: i64) -> String {
    format!("backup-{}.json", timestamp_ms)
}

/// Parse a backup filename into its timestamp and optional id
///
/// Returns `None` if the name doesn't match `backup-<digits>[-<id>].json`.
pub fn parse_backup_filename(filename: &str) -> Option<(i64, Option<&str>)> {
    let stem = filename.strip_prefix("backup-")?.strip_suffix(".json")?;

    let (digits, id) = match stem.split_once('-') {
        Some((digits, id)) => (digits, Some(id)),
        None => (stem, None),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    if let Some(id) = id {
        if id.is_empty()
            || !id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return None;
        }
    }

    let timestamp: i64 = digits.parse().ok()?;
    Some((timestamp, id))
}

/// Check whether a directory entry looks like a backup artifact
pub fn is_backup_filename(filename: &str) -> bool {
    parse_backup_filename(filename).is_some()
}

/// Normalize a path logically, resolving `.` and `..` without touching disk
///
/// `..` at the root is dropped rather than preserved, matching how the
/// filesystem itself would resolve the path.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_normalized_location_inside_root() {
        let root = Path::new("/home/user/.config/snapvault");
        let location = Path::new("/home/user/.config/snapvault/backups");
        assert!(validate_backup_location(location, root).is_ok());
    }

    #[test]
    fn test_rejects_relative_location() {
        let root = Path::new("/home/user/.config/snapvault");
        let err = validate_backup_location(Path::new("backups"), root).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn test_rejects_parent_segments() {
        let root = Path::new("/home/user/.config/snapvault");
        let location = Path::new("/home/user/.config/snapvault/backups/../../../etc");
        let err = validate_backup_location(location, root).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("normalized"));
    }

    #[test]
    fn test_rejects_location_outside_root() {
        let root = Path::new("/home/user/.config/snapvault");
        let err = validate_backup_location(Path::new("/tmp/backups"), root).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("data directory"));
    }

    #[test]
    fn test_rejects_root_itself() {
        let root = Path::new("/home/user/.config/snapvault");
        assert!(validate_backup_location(root, root).is_err());
    }

    #[test]
    fn test_rejects_empty_location() {
        let root = Path::new("/home/user/.config/snapvault");
        assert!(validate_backup_location(Path::new(""), root).is_err());
    }

    #[test]
    fn test_rejects_illegal_characters() {
        let root = Path::new("/home/user/.config/snapvault");
        let location = Path::new("/home/user/.config/snapvault/back|ups");
        let err = validate_backup_location(location, root).unwrap_err();
        assert!(err.to_string().contains("illegal character"));
    }

    #[test]
    fn test_filename_with_id() {
        assert!(validate_backup_filename("backup-1700000000000-abc.json").is_ok());
        assert_eq!(
            parse_backup_filename("backup-1700000000000-abc.json"),
            Some((1_700_000_000_000, Some("abc")))
        );
    }

    #[test]
    fn test_legacy_filename_without_id() {
        assert!(validate_backup_filename("backup-1700000000000.json").is_ok());
        assert_eq!(
            parse_backup_filename("backup-1700000000000.json"),
            Some((1_700_000_000_000, None))
        );
    }

    #[test]
    fn test_filename_with_uuid_style_id() {
        let name = "backup-1700000000000-550e8400-e29b-41d4-a716-446655440000.json";
        assert!(validate_backup_filename(name).is_ok());
        let (ts, id) = parse_backup_filename(name).unwrap();
        assert_eq!(ts, 1_700_000_000_000);
        assert_eq!(id, Some("550e8400-e29b-41d4-a716-446655440000"));
    }

    #[test]
    fn test_rejects_traversal_filename() {
        let err = validate_backup_filename("../../etc/passwd").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_rejects_malformed_filenames() {
        assert!(validate_backup_filename("backup-.json").is_err());
        assert!(validate_backup_filename("backup-abc.json").is_err());
        assert!(validate_backup_filename("backup-123.txt").is_err());
        assert!(validate_backup_filename("notes.json").is_err());
        assert!(validate_backup_filename("backup-123-.json").is_err());
        assert!(validate_backup_filename("backup-123-a b.json").is_err());
    }

    #[test]
    fn test_filename_round_trip() {
        let name = backup_filename(1_700_000_000_000, "abc123");
        assert_eq!(name, "backup-1700000000000-abc123.json");
        assert!(validate_backup_filename(&name).is_ok());

        let legacy = legacy_backup_filename(1_700_000_000_000);
        assert_eq!(legacy, "backup-1700000000000.json");
        assert!(validate_backup_filename(&legacy).is_ok());
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/a/b/./c/../d")),
            PathBuf::from("/a/b/d")
        );
        assert_eq!(normalize_path(Path::new("/a/b")), PathBuf::from("/a/b"));
        assert_eq!(normalize_path(Path::new("/../a")), PathBuf::from("/a"));
    }
}
