//! Command surface for the backup subsystem
//!
//! [`BackupService`] is the request/response boundary callers use: schedule
//! config get/set, backup location get/set, list/read/delete/restore,
//! immediate triggers, status, and history. Construction is cheap and
//! idempotent, so the embedding application can re-register the surface on
//! every process start.
//!
//! Results crossing this boundary are structured values; raw error chains
//! stay inside and are logged instead.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backup::engine::{BackupEngine, BackupMode, DataStore, JsonPayloadBuilder};
use crate::backup::fs_lock::FileOpsLock;
use crate::backup::history::{HistoryEntry, HistoryStore};
use crate::backup::notify::{BackupNotifier, SchedulerStatus};
use crate::backup::restore::{RestoreApplier, RestoreEngine, RestoreOptions, RestoreOutcome};
use crate::backup::rotation::{scan_backup_dir, BackupFileMeta};
use crate::backup::scheduler::BackupScheduler;
use crate::backup::validate::{validate_backup_filename, validate_backup_location};
use crate::config::{ScheduleConfig, VaultPaths};
use crate::error::{VaultError, VaultResult};

/// Structured result of an immediate backup trigger
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRunResult {
    /// Whether the run completed
    pub success: bool,
    /// Identifier of the new backup on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_id: Option<String>,
    /// Human-readable failure reason otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The backup subsystem's public command surface
pub struct BackupService {
    paths: VaultPaths,
    scheduler: BackupScheduler,
    restore_engine: RestoreEngine,
    history: HistoryStore,
    fs_lock: FileOpsLock,
    notifier: Arc<dyn BackupNotifier>,
}

impl BackupService {
    /// Wire up the subsystem over the given collaborators
    pub fn new(
        paths: VaultPaths,
        app_version: impl Into<String>,
        store: Arc<dyn DataStore>,
        applier: Arc<dyn RestoreApplier>,
        notifier: Arc<dyn BackupNotifier>,
    ) -> Self {
        let fs_lock = FileOpsLock::new();
        let engine = Arc::new(BackupEngine::new(
            paths.clone(),
            app_version,
            store,
            Arc::new(JsonPayloadBuilder),
            notifier.clone(),
            fs_lock.clone(),
        ));
        let scheduler = BackupScheduler::new(paths.clone(), engine, notifier.clone());
        let restore_engine = RestoreEngine::new(paths.clone(), applier, fs_lock.clone());
        let history = HistoryStore::new(&paths);

        Self {
            paths,
            scheduler,
            restore_engine,
            history,
            fs_lock,
            notifier,
        }
    }

    /// Start scheduling from the persisted config
    ///
    /// Called once at process start; safe to call again after restarts.
    pub fn start(&self) -> VaultResult<()> {
        let config = ScheduleConfig::load_or_default(&self.paths)?;
        self.scheduler.update(&config)
    }

    /// The scheduler, for embedders that drive it directly
    pub fn scheduler(&self) -> &BackupScheduler {
        &self.scheduler
    }

    // ── Schedule config ─────────────────────────────────────────────────

    /// Read the persisted schedule config
    pub fn get_schedule_config(&self) -> VaultResult<ScheduleConfig> {
        ScheduleConfig::load_or_default(&self.paths)
    }

    /// Validate, persist, and apply a new schedule config
    ///
    /// Count and size limits are clamped into range; an explicit backup
    /// location must pass the path validator. The run timestamps are
    /// system-owned and always kept from disk, so a stale snapshot in the
    /// caller's hands cannot rewind them.
    pub fn set_schedule_config(&self, mut config: ScheduleConfig) -> VaultResult<ScheduleConfig> {
        config.clamp_limits();

        if let Some(location) = &config.backup_location {
            validate_backup_location(location, self.paths.base_dir())?;
        }

        let persisted = ScheduleConfig::load_or_default(&self.paths)?;
        config.last_backup_at = persisted.last_backup_at;
        config.next_backup_at = persisted.next_backup_at;

        config.save(&self.paths)?;
        self.scheduler.update(&config)?;

        ScheduleConfig::load_or_default(&self.paths)
    }

    // ── Backup location ─────────────────────────────────────────────────

    /// The effective backup directory (configured or default)
    pub fn get_backup_location(&self) -> VaultResult<PathBuf> {
        let config = ScheduleConfig::load_or_default(&self.paths)?;
        Ok(config.backup_dir(&self.paths))
    }

    /// Validate and persist an explicit backup location
    pub fn set_backup_location(&self, location: PathBuf) -> VaultResult<()> {
        validate_backup_location(&location, self.paths.base_dir())?;

        let mut config = ScheduleConfig::load_or_default(&self.paths)?;
        config.backup_location = Some(location);
        config.save(&self.paths)
    }

    // ── Artifacts ───────────────────────────────────────────────────────

    /// List the artifacts in the backup directory, newest first
    pub async fn list_backups(&self) -> VaultResult<Vec<BackupFileMeta>> {
        let dir = self.get_backup_location()?;
        scan_backup_dir(&dir).await
    }

    /// Read one artifact's raw contents (size-capped)
    pub async fn read_backup(&self, filename: &str) -> VaultResult<String> {
        self.restore_engine.read_artifact(filename).await
    }

    /// Delete one artifact and drop its history entry
    pub async fn delete_backup(&self, filename: &str) -> VaultResult<()> {
        validate_backup_filename(filename)?;
        let dir = self.get_backup_location()?;
        validate_backup_location(&dir, self.paths.base_dir())?;

        let _guard = self.fs_lock.acquire().await;

        let path = dir.join(filename);
        tokio::fs::remove_file(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VaultError::backup_not_found(filename)
            } else {
                VaultError::Io(format!("Failed to delete backup file: {}", e))
            }
        })?;
        tracing::info!(file = filename, "deleted backup");

        // The on-disk truth changed; bring the log back in line.
        let remaining: HashSet<String> = scan_backup_dir(&dir)
            .await?
            .into_iter()
            .map(|f| f.filename)
            .collect();
        if self.history.reconcile(&remaining)? {
            self.notifier.history_updated();
        }

        Ok(())
    }

    /// Restore application data from the named artifact
    pub async fn restore_backup(&self, filename: &str, merge: bool) -> RestoreOutcome {
        self.restore_engine
            .restore(filename, &RestoreOptions { merge })
            .await
    }

    // ── Immediate triggers ──────────────────────────────────────────────

    /// Trigger an immediate backup
    ///
    /// A second trigger while a run is active gets an explicit
    /// already-in-progress result rather than being queued.
    pub async fn trigger_backup(&self) -> BackupRunResult {
        match self.scheduler.run_backup(BackupMode::Immediate).await {
            Ok(outcome) => BackupRunResult {
                success: true,
                backup_id: Some(outcome.backup_id),
                error: None,
            },
            Err(e) => BackupRunResult {
                success: false,
                backup_id: None,
                error: Some(e.to_string()),
            },
        }
    }

    /// Programmatic alias for [`BackupService::trigger_backup`]
    pub async fn backup_now(&self) -> BackupRunResult {
        self.trigger_backup().await
    }

    // ── Status & history ────────────────────────────────────────────────

    /// Current scheduler status
    pub fn scheduler_status(&self) -> VaultResult<SchedulerStatus> {
        self.scheduler.status()
    }

    /// The persisted history log, newest first
    pub fn get_history(&self) -> VaultResult<Vec<HistoryEntry>> {
        self.history.load()
    }

    /// Empty the history log (artifacts are untouched)
    pub fn clear_history(&self) -> VaultResult<()> {
        self.history.clear()?;
        self.notifier.history_updated();
        Ok(())
    }
}
