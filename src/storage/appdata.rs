//! File-backed application data collaborators
//!
//! The library takes its data store and restore applier as trait objects;
//! these are the implementations the snapvault binary wires in. Each data
//! category lives as one JSON file under `data/` in the application root,
//! and restores rewrite those files, shallow-merging objects when the
//! merge option is set.

use std::path::PathBuf;

use crate::backup::engine::{BackupArtifact, DataStore};
use crate::backup::restore::{RestoreApplier, RestoreOptions, RestoreOutcome};
use crate::config::VaultPaths;

/// Data store reading one JSON file per category from `data/`
pub struct FsDataStore {
    data_dir: PathBuf,
}

impl FsDataStore {
    /// Create a store over the data directory under the application root
    pub fn new(paths: &VaultPaths) -> Self {
        Self {
            data_dir: paths.data_dir(),
        }
    }

    fn category_file(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }
}

impl DataStore for FsDataStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.category_file(key);
        let contents = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(category = key, error = %e, "category file is not valid JSON");
                None
            }
        }
    }
}

/// Restore applier rewriting the per-category JSON files
pub struct FsRestoreApplier {
    data_dir: PathBuf,
}

impl FsRestoreApplier {
    /// Create an applier over the data directory under the application root
    pub fn new(paths: &VaultPaths) -> Self {
        Self {
            data_dir: paths.data_dir(),
        }
    }

    fn apply_category(
        &self,
        key: &str,
        serialized: &str,
        options: &RestoreOptions,
    ) -> Result<(), String> {
        let restored: serde_json::Value = serde_json::from_str(serialized)
            .map_err(|e| format!("category {} is not valid JSON: {}", key, e))?;

        let path = self.data_dir.join(format!("{}.json", key));

        let value = if options.merge {
            merge_values(read_existing(&path), restored)
        } else {
            restored
        };

        std::fs::create_dir_all(&self.data_dir)
            .map_err(|e| format!("failed to create data directory: {}", e))?;

        let contents = serde_json::to_string_pretty(&value)
            .map_err(|e| format!("failed to serialize category {}: {}", key, e))?;
        std::fs::write(&path, contents)
            .map_err(|e| format!("failed to write category {}: {}", key, e))?;

        Ok(())
    }
}

impl RestoreApplier for FsRestoreApplier {
    fn apply(&self, artifact: &BackupArtifact, options: &RestoreOptions) -> RestoreOutcome {
        let mut errors = Vec::new();

        for (key, serialized) in &artifact.data {
            if let Err(message) = self.apply_category(key, serialized, options) {
                tracing::warn!(category = %key, error = %message, "failed to restore category");
                errors.push(message);
            }
        }

        RestoreOutcome {
            success: errors.is_empty(),
            errors,
        }
    }
}

fn read_existing(path: &std::path::Path) -> Option<serde_json::Value> {
    let contents = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&contents).ok()
}

/// Shallow-merge `restored` over `existing` when both are objects;
/// otherwise the restored value wins outright.
fn merge_values(
    existing: Option<serde_json::Value>,
    restored: serde_json::Value,
) -> serde_json::Value {
    match (existing, restored) {
        (Some(serde_json::Value::Object(mut base)), serde_json::Value::Object(incoming)) => {
            for (key, value) in incoming {
                base.insert(key, value);
            }
            serde_json::Value::Object(base)
        }
        (_, restored) => restored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::engine::ArtifactMetadata;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn artifact(data: &[(&str, &str)]) -> BackupArtifact {
        BackupArtifact {
            metadata: ArtifactMetadata {
                id: "abc".to_string(),
                timestamp: 1,
                app_version: "1.0.0".to_string(),
                data_keys: data.iter().map(|(k, _)| k.to_string()).collect(),
                size: 0,
            },
            data: data
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_store_reads_category_files() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        paths.ensure_directories().unwrap();

        std::fs::write(
            paths.data_dir().join("settings.json"),
            r#"{"theme": "dark"}"#,
        )
        .unwrap();

        let store = FsDataStore::new(&paths);
        assert_eq!(store.get("settings"), Some(json!({"theme": "dark"})));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_store_skips_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        paths.ensure_directories().unwrap();

        std::fs::write(paths.data_dir().join("settings.json"), "not json").unwrap();

        let store = FsDataStore::new(&paths);
        assert_eq!(store.get("settings"), None);
    }

    #[test]
    fn test_apply_replaces_category_files() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        paths.ensure_directories().unwrap();

        std::fs::write(paths.data_dir().join("settings.json"), r#"{"old": true}"#).unwrap();

        let applier = FsRestoreApplier::new(&paths);
        let outcome = applier.apply(
            &artifact(&[("settings", r#"{"theme":"dark"}"#)]),
            &RestoreOptions::default(),
        );

        assert!(outcome.success);
        let store = FsDataStore::new(&paths);
        assert_eq!(store.get("settings"), Some(json!({"theme": "dark"})));
    }

    #[test]
    fn test_apply_merges_objects() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        paths.ensure_directories().unwrap();

        std::fs::write(
            paths.data_dir().join("settings.json"),
            r#"{"theme": "light", "lang": "en"}"#,
        )
        .unwrap();

        let applier = FsRestoreApplier::new(&paths);
        let outcome = applier.apply(
            &artifact(&[("settings", r#"{"theme":"dark"}"#)]),
            &RestoreOptions { merge: true },
        );

        assert!(outcome.success);
        let store = FsDataStore::new(&paths);
        assert_eq!(
            store.get("settings"),
            Some(json!({"theme": "dark", "lang": "en"}))
        );
    }

    #[test]
    fn test_apply_isolates_per_category_errors() {
        let temp_dir = TempDir::new().unwrap();
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        paths.ensure_directories().unwrap();

        let applier = FsRestoreApplier::new(&paths);
        let outcome = applier.apply(
            &artifact(&[
                ("broken", "not json"),
                ("settings", r#"{"theme":"dark"}"#),
            ]),
            &RestoreOptions::default(),
        );

        // The broken category fails, the good one still lands.
        assert!(!outcome.success);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("broken"));
        let store = FsDataStore::new(&paths);
        assert_eq!(store.get("settings"), Some(json!({"theme": "dark"})));
    }
}
