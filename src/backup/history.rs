//! Persisted backup history
//!
//! An append-only log of backup metadata, stored newest-first as a JSON
//! file under the application data root. The log is bookkeeping, not ground
//! truth: files can disappear outside our control, so the log is
//! periodically reconciled against the set of artifacts that actually exist
//! on disk.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::validate::legacy_backup_filename;
use crate::config::VaultPaths;
use crate::error::VaultResult;
use crate::storage::file_io;

/// Metadata recorded for one successful backup run
///
/// Entries are immutable once created. `filename` is `None` only on entries
/// written by releases that predate storing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Opaque backup identifier
    pub id: String,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    /// Application version that produced the backup
    pub app_version: String,
    /// Data categories included in the artifact
    pub data_keys: Vec<String>,
    /// Artifact size in bytes as reported by the payload builder
    pub size: u64,
    /// Artifact filename, if recorded
    #[serde(default)]
    pub filename: Option<String>,
}

/// Load, mutate, and persist the backup history log
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    /// Create a store over the history file under the data root
    pub fn new(paths: &VaultPaths) -> Self {
        Self {
            path: paths.history_file(),
        }
    }

    /// Load all entries, newest first; an absent file is an empty history
    pub fn load(&self) -> VaultResult<Vec<HistoryEntry>> {
        file_io::read_json(&self.path)
    }

    /// Persist the given entries, replacing the current log
    pub fn save(&self, entries: &[HistoryEntry]) -> VaultResult<()> {
        file_io::write_json_atomic(&self.path, &entries)
    }

    /// Prepend a new entry and trim the log to `max_entries`
    pub fn prepend_trimmed(&self, entry: HistoryEntry, max_entries: usize) -> VaultResult<()> {
        let mut entries = self.load()?;
        entries.insert(0, entry);
        entries.truncate(max_entries);
        self.save(&entries)
    }

    /// Drop every entry whose artifact is no longer on disk
    ///
    /// `remaining` is the authoritative set of filenames that exist in the
    /// backup directory. An entry is kept iff its stored filename is in
    /// that set; a legacy entry without a stored filename is kept iff the
    /// name reconstructed from its timestamp is present. Returns whether
    /// the log changed.
    pub fn reconcile(&self, remaining: &HashSet<String>) -> VaultResult<bool> {
        let entries = self.load()?;
        let before = entries.len();

        let kept: Vec<HistoryEntry> = entries
            .into_iter()
            .filter(|entry| match &entry.filename {
                Some(filename) => remaining.contains(filename),
                None => remaining.contains(&legacy_backup_filename(entry.timestamp)),
            })
            .collect();

        let changed = kept.len() != before;
        if changed {
            tracing::debug!(
                dropped = before - kept.len(),
                "reconciled history against on-disk artifacts"
            );
            self.save(&kept)?;
        }
        Ok(changed)
    }

    /// Remove every entry, leaving an empty log
    pub fn clear(&self) -> VaultResult<()> {
        self.save(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (HistoryStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        (HistoryStore::new(&paths), temp_dir)
    }

    fn entry(id: &str, timestamp: i64, filename: Option<&str>) -> HistoryEntry {
        HistoryEntry {
            id: id.to_string(),
            timestamp,
            app_version: "1.0.0".to_string(),
            data_keys: vec!["settings".to_string()],
            size: 128,
            filename: filename.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_empty_history() {
        let (store, _temp) = test_store();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_prepend_keeps_newest_first() {
        let (store, _temp) = test_store();

        store
            .prepend_trimmed(entry("a", 1, Some("backup-1-a.json")), 10)
            .unwrap();
        store
            .prepend_trimmed(entry("b", 2, Some("backup-2-b.json")), 10)
            .unwrap();

        let entries = store.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "b");
        assert_eq!(entries[1].id, "a");
    }

    #[test]
    fn test_prepend_trims_to_limit() {
        let (store, _temp) = test_store();

        for i in 0..5 {
            let name = format!("backup-{}-x.json", i);
            store
                .prepend_trimmed(entry("x", i, Some(&name)), 3)
                .unwrap();
        }

        let entries = store.load().unwrap();
        assert_eq!(entries.len(), 3);
        // Newest three survive
        assert_eq!(entries[0].timestamp, 4);
        assert_eq!(entries[2].timestamp, 2);
    }

    #[test]
    fn test_reconcile_drops_missing_files() {
        let (store, _temp) = test_store();

        store
            .save(&[
                entry("a", 1, Some("backup-1-a.json")),
                entry("b", 2, Some("backup-2-b.json")),
            ])
            .unwrap();

        let remaining: HashSet<String> = ["backup-2-b.json".to_string()].into();
        let changed = store.reconcile(&remaining).unwrap();

        assert!(changed);
        let entries = store.load().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "b");
    }

    #[test]
    fn test_reconcile_keeps_present_files() {
        let (store, _temp) = test_store();

        store
            .save(&[entry("a", 1, Some("backup-1-a.json"))])
            .unwrap();

        let remaining: HashSet<String> = ["backup-1-a.json".to_string()].into();
        let changed = store.reconcile(&remaining).unwrap();

        assert!(!changed);
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_reconcile_legacy_entries_via_reconstructed_name() {
        let (store, _temp) = test_store();

        store
            .save(&[
                entry("kept", 1_700_000_000_000, None),
                entry("dropped", 1_600_000_000_000, None),
            ])
            .unwrap();

        let remaining: HashSet<String> = ["backup-1700000000000.json".to_string()].into();
        let changed = store.reconcile(&remaining).unwrap();

        assert!(changed);
        let entries = store.load().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "kept");
    }

    #[test]
    fn test_reconcile_mixed_legacy_and_current() {
        let (store, _temp) = test_store();

        store
            .save(&[
                entry("current", 3, Some("backup-3-current.json")),
                entry("legacy", 2, None),
                entry("gone", 1, Some("backup-1-gone.json")),
            ])
            .unwrap();

        let remaining: HashSet<String> = [
            "backup-3-current.json".to_string(),
            "backup-2.json".to_string(),
        ]
        .into();
        store.reconcile(&remaining).unwrap();

        let ids: Vec<String> = store.load().unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["current", "legacy"]);
    }

    #[test]
    fn test_clear() {
        let (store, _temp) = test_store();

        store
            .save(&[entry("a", 1, Some("backup-1-a.json"))])
            .unwrap();
        store.clear().unwrap();

        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_wire_field_names() {
        let json =
            serde_json::to_string(&entry("a", 1, Some("backup-1-a.json"))).unwrap();
        assert!(json.contains("appVersion"));
        assert!(json.contains("dataKeys"));
        assert!(json.contains("filename"));
    }
}
