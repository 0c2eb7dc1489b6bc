//! Backup engine
//!
//! Orchestrates one backup run end to end: directory setup, data
//! collection from the application data store, artifact write, history
//! update, rotation, and timestamp persistence. Every run executes under
//! the file-ops lock, and a separate `running` flag rejects a second
//! concurrent workflow outright instead of queueing it.
//!
//! # Artifact Format
//!
//! Artifacts are JSON files named `backup-<epochMillis>-<backupId>.json`
//! with a metadata block followed by the opaque data map:
//!
//! ```json
//! {
//!   "metadata": { "id": "...", "timestamp": 0, "appVersion": "...",
//!                 "dataKeys": ["..."], "size": 0 },
//!   "data": { "<category>": "<serialized value>" }
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::fs_lock::FileOpsLock;
use super::history::{HistoryEntry, HistoryStore};
use super::notify::{BackupCompleted, BackupNotifier};
use super::rotation;
use super::validate::backup_filename;
use crate::config::{ScheduleConfig, VaultPaths};
use crate::error::{VaultError, VaultResult};

/// Data categories captured in every backup
pub const DATA_CATEGORIES: &[&str] =
    &["settings", "library", "collections", "progress", "metadata"];

/// Why a backup run was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupMode {
    /// User-triggered or programmatic immediate run
    Immediate,
    /// Timer-driven scheduled run
    Scheduled,
}

impl std::fmt::Display for BackupMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupMode::Immediate => write!(f, "immediate"),
            BackupMode::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// Metadata block embedded in every artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    /// Opaque backup identifier
    pub id: String,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    /// Application version that produced the backup
    pub app_version: String,
    /// Data categories included
    pub data_keys: Vec<String>,
    /// Serialized size of the data map in bytes
    pub size: u64,
}

/// The full on-disk artifact: metadata plus the opaque data map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupArtifact {
    /// Metadata block
    pub metadata: ArtifactMetadata,
    /// Category name to serialized value
    pub data: BTreeMap<String, String>,
}

/// Finished payload handed back by a [`PayloadBuilder`]
#[derive(Debug, Clone)]
pub struct BackupPayload {
    /// Serialized artifact contents, written to disk verbatim
    pub data: String,
    /// Identifier assigned to this backup
    pub backup_id: String,
    /// Payload size in bytes
    pub size: u64,
}

/// Result of a successful backup run
#[derive(Debug, Clone)]
pub struct BackupOutcome {
    /// Identifier of the new backup
    pub backup_id: String,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    /// Artifact filename
    pub filename: String,
    /// Payload size in bytes
    pub size: u64,
}

/// Read access to the application's persisted data
///
/// Values that aren't strings are JSON-serialized before being backed up.
pub trait DataStore: Send + Sync {
    /// Fetch one data category, if present
    fn get(&self, key: &str) -> Option<serde_json::Value>;
}

/// Builds the artifact contents for one backup run
pub trait PayloadBuilder: Send + Sync {
    /// Assemble the serialized artifact from the collected data map
    fn build(
        &self,
        data: &BTreeMap<String, String>,
        app_version: &str,
        timestamp_ms: i64,
    ) -> VaultResult<BackupPayload>;
}

/// Default payload builder: pretty JSON artifact with a v4-uuid backup id
#[derive(Debug, Default)]
pub struct JsonPayloadBuilder;

impl PayloadBuilder for JsonPayloadBuilder {
    fn build(
        &self,
        data: &BTreeMap<String, String>,
        app_version: &str,
        timestamp_ms: i64,
    ) -> VaultResult<BackupPayload> {
        let backup_id = uuid::Uuid::new_v4().simple().to_string();

        let data_json = serde_json::to_string(data)
            .map_err(|e| VaultError::Json(format!("Failed to serialize backup data: {}", e)))?;
        let size = data_json.len() as u64;

        let artifact = BackupArtifact {
            metadata: ArtifactMetadata {
                id: backup_id.clone(),
                timestamp: timestamp_ms,
                app_version: app_version.to_string(),
                data_keys: data.keys().cloned().collect(),
                size,
            },
            data: data.clone(),
        };

        let contents = serde_json::to_string_pretty(&artifact)
            .map_err(|e| VaultError::Json(format!("Failed to serialize artifact: {}", e)))?;

        Ok(BackupPayload {
            data: contents,
            backup_id,
            size,
        })
    }
}

/// Runs backup workflows
pub struct BackupEngine {
    paths: VaultPaths,
    app_version: String,
    store: Arc<dyn DataStore>,
    builder: Arc<dyn PayloadBuilder>,
    notifier: Arc<dyn BackupNotifier>,
    history: HistoryStore,
    fs_lock: FileOpsLock,
    running: AtomicBool,
}

impl BackupEngine {
    /// Create a new engine over the given collaborators
    pub fn new(
        paths: VaultPaths,
        app_version: impl Into<String>,
        store: Arc<dyn DataStore>,
        builder: Arc<dyn PayloadBuilder>,
        notifier: Arc<dyn BackupNotifier>,
        fs_lock: FileOpsLock,
    ) -> Self {
        let history = HistoryStore::new(&paths);
        Self {
            paths,
            app_version: app_version.into(),
            store,
            builder,
            notifier,
            history,
            fs_lock,
            running: AtomicBool::new(false),
        }
    }

    /// Whether a backup workflow is active right now
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The history store shared with rotation and the command surface
    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Run one full backup workflow
    ///
    /// Rejects with [`VaultError::BackupInProgress`] if another workflow is
    /// active. Any other error aborts the run after emitting exactly one
    /// backup-error notification. Not idempotent: every successful call
    /// produces a new artifact.
    pub async fn perform_backup(
        &self,
        config: &ScheduleConfig,
        mode: BackupMode,
    ) -> VaultResult<BackupOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(VaultError::BackupInProgress);
        }

        tracing::info!(%mode, "starting backup");
        let result = self.run_workflow(config).await;
        self.running.store(false, Ordering::SeqCst);

        match &result {
            Ok(outcome) => {
                self.notifier.backup_completed(BackupCompleted {
                    backup_id: outcome.backup_id.clone(),
                    timestamp: outcome.timestamp,
                });
            }
            Err(e) => {
                tracing::error!(%mode, error = %e, "backup failed");
                self.notifier.backup_error(&e.to_string());
            }
        }

        result
    }

    async fn run_workflow(&self, config: &ScheduleConfig) -> VaultResult<BackupOutcome> {
        let _guard = self.fs_lock.acquire().await;

        // (1) Resolve and create the backup directory.
        let dir = config.backup_dir(&self.paths);
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            VaultError::Io(format!(
                "Failed to create backup directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        // (2) Collect the data categories into a key -> string map.
        let data = self.collect_data()?;

        // (3) Build the artifact payload.
        let timestamp = chrono::Utc::now().timestamp_millis();
        let payload = self.builder.build(&data, &self.app_version, timestamp)?;

        // (4) Write the artifact.
        let filename = backup_filename(timestamp, &payload.backup_id);
        let artifact_path = dir.join(&filename);
        tokio::fs::write(&artifact_path, payload.data.as_bytes())
            .await
            .map_err(|e| {
                VaultError::Io(format!(
                    "Failed to write backup file {}: {}",
                    artifact_path.display(),
                    e
                ))
            })?;

        // (5) Record the run in the history log.
        let entry = HistoryEntry {
            id: payload.backup_id.clone(),
            timestamp,
            app_version: self.app_version.clone(),
            data_keys: data.keys().cloned().collect(),
            size: payload.size,
            filename: Some(filename.clone()),
        };
        self.history
            .prepend_trimmed(entry, config.max_backup_count as usize)?;
        self.notifier.history_updated();

        // (6) Rotate out artifacts exceeding the retention limits.
        rotation::enforce_retention(&dir, config, &self.history, self.notifier.as_ref()).await?;

        // (7) Persist the new schedule timestamps.
        let mut fresh = ScheduleConfig::load_or_default(&self.paths)?;
        fresh.last_backup_at = Some(timestamp);
        fresh.next_backup_at = Some(timestamp + fresh.interval.interval_ms());
        fresh.save(&self.paths)?;

        tracing::info!(
            backup_id = %payload.backup_id,
            file = %filename,
            size = payload.size,
            "backup written"
        );

        Ok(BackupOutcome {
            backup_id: payload.backup_id,
            timestamp,
            filename,
            size: payload.size,
        })
    }

    /// Read the fixed data categories, serializing non-string values
    fn collect_data(&self) -> VaultResult<BTreeMap<String, String>> {
        let mut data = BTreeMap::new();

        for &key in DATA_CATEGORIES {
            match self.store.get(key) {
                Some(serde_json::Value::String(text)) => {
                    data.insert(key.to_string(), text);
                }
                Some(value) => {
                    let text = serde_json::to_string(&value).map_err(|e| {
                        VaultError::Json(format!("Failed to serialize category {}: {}", key, e))
                    })?;
                    data.insert(key.to_string(), text);
                }
                None => {
                    tracing::debug!(category = key, "category absent, skipping");
                }
            }
        }

        Ok(data)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::backup::notify::test_support::{Event, RecordingNotifier};
    use crate::backup::rotation::scan_backup_dir;
    use tempfile::TempDir;

    fn test_engine(
        temp_dir: &TempDir,
        store: Arc<dyn DataStore>,
        builder: Arc<dyn PayloadBuilder>,
    ) -> (Arc<BackupEngine>, Arc<RecordingNotifier>, VaultPaths) {
        let paths = VaultPaths::with_base_dir(temp_dir.path().to_path_buf());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = Arc::new(BackupEngine::new(
            paths.clone(),
            "1.2.3",
            store,
            builder,
            notifier.clone(),
            FileOpsLock::new(),
        ));
        (engine, notifier, paths)
    }

    #[tokio::test]
    async fn test_perform_backup_writes_artifact_and_history() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, notifier, paths) = test_engine(
            &temp_dir,
            Arc::new(MapDataStore::with_sample_data()),
            Arc::new(JsonPayloadBuilder),
        );

        let config = ScheduleConfig::default();
        let outcome = engine
            .perform_backup(&config, BackupMode::Immediate)
            .await
            .unwrap();

        // Artifact on disk, named for the run.
        let files = scan_backup_dir(&paths.default_backup_dir()).await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, outcome.filename);

        // Artifact parses back into the expected shape.
        let contents = std::fs::read_to_string(&files[0].path).unwrap();
        let artifact: BackupArtifact = serde_json::from_str(&contents).unwrap();
        assert_eq!(artifact.metadata.id, outcome.backup_id);
        assert_eq!(artifact.metadata.app_version, "1.2.3");
        assert_eq!(artifact.data["settings"], r#"{"theme":"dark"}"#);
        assert_eq!(artifact.data["library"], "[1,2,3]");

        // One history entry, newest first.
        let entries = engine.history().load().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, outcome.backup_id);
        assert_eq!(entries[0].filename, Some(outcome.filename.clone()));

        // Timestamps persisted.
        let config = ScheduleConfig::load_or_default(&paths).unwrap();
        assert_eq!(config.last_backup_at, Some(outcome.timestamp));
        assert_eq!(
            config.next_backup_at,
            Some(outcome.timestamp + config.interval.interval_ms())
        );

        // Completion notification carries the backup id.
        assert!(notifier.events().iter().any(|e| matches!(
            e,
            Event::Completed { backup_id, .. } if *backup_id == outcome.backup_id
        )));
    }

    #[tokio::test]
    async fn test_second_run_produces_new_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, _notifier, paths) = test_engine(
            &temp_dir,
            Arc::new(MapDataStore::with_sample_data()),
            Arc::new(JsonPayloadBuilder),
        );

        let config = ScheduleConfig::default();
        let first = engine
            .perform_backup(&config, BackupMode::Immediate)
            .await
            .unwrap();
        let second = engine
            .perform_backup(&config, BackupMode::Scheduled)
            .await
            .unwrap();

        assert_ne!(first.backup_id, second.backup_id);
        let files = scan_backup_dir(&paths.default_backup_dir()).await.unwrap();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_run_emits_error_and_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, notifier, paths) = test_engine(
            &temp_dir,
            Arc::new(MapDataStore::with_sample_data()),
            Arc::new(FailingBuilder),
        );

        let config = ScheduleConfig::default();
        let err = engine
            .perform_backup(&config, BackupMode::Immediate)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Storage(_)));

        // No artifact, no history entry, flag cleared, one error event.
        let files = scan_backup_dir(&paths.default_backup_dir()).await.unwrap();
        assert!(files.is_empty());
        assert!(engine.history().load().unwrap().is_empty());
        assert!(!engine.is_running());
        assert_eq!(
            notifier
                .events()
                .iter()
                .filter(|e| matches!(e, Event::Error(_)))
                .count(),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_trigger_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let (store, release) = GatedDataStore::new();
        let (engine, _notifier, _paths) =
            test_engine(&temp_dir, Arc::new(store), Arc::new(JsonPayloadBuilder));

        let config = ScheduleConfig::default();
        let first = {
            let engine = engine.clone();
            let config = config.clone();
            tokio::spawn(
                async move { engine.perform_backup(&config, BackupMode::Immediate).await },
            )
        };

        // Wait until the first workflow is mid-flight.
        while !engine.is_running() {
            tokio::task::yield_now().await;
        }

        let err = engine
            .perform_backup(&config, BackupMode::Immediate)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::BackupInProgress));
        assert!(err.to_string().contains("already in progress"));

        release.send(()).unwrap();
        let outcome = first.await.unwrap().unwrap();
        assert!(!outcome.backup_id.is_empty());
    }

    #[tokio::test]
    async fn test_rotation_runs_inside_backup() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, _notifier, paths) = test_engine(
            &temp_dir,
            Arc::new(MapDataStore::with_sample_data()),
            Arc::new(JsonPayloadBuilder),
        );

        let config = ScheduleConfig {
            max_backup_count: 2,
            ..Default::default()
        };

        for _ in 0..4 {
            engine
                .perform_backup(&config, BackupMode::Scheduled)
                .await
                .unwrap();
            // Keep artifact mtimes strictly ordered.
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let files = scan_backup_dir(&paths.default_backup_dir()).await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(engine.history().load().unwrap().len(), 2);
    }
}
