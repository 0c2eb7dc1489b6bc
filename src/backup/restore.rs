//! Restore engine
//!
//! Validates and reads a backup artifact, then delegates the application of
//! its contents to an external collaborator. All validation happens before
//! any filesystem call; reads are bounded by a hard size cap so a
//! corrupted or hostile artifact cannot exhaust memory.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::engine::BackupArtifact;
use super::fs_lock::FileOpsLock;
use super::validate::{validate_backup_filename, validate_backup_location};
use crate::config::{ScheduleConfig, VaultPaths};
use crate::error::{VaultError, VaultResult};

/// Hard cap on artifact reads, in bytes
pub const MAX_RESTORE_BYTES: u64 = 100 * 1024 * 1024;

/// Options controlling how a restore is applied
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestoreOptions {
    /// Merge restored categories into existing data instead of replacing it
    #[serde(default)]
    pub merge: bool,
}

/// Result of a restore, returned verbatim from the applier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreOutcome {
    /// Whether every category applied cleanly
    pub success: bool,
    /// Per-category failure descriptions
    #[serde(default)]
    pub errors: Vec<String>,
}

impl RestoreOutcome {
    /// A fully successful restore
    pub fn ok() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    /// A failed restore with a single descriptive error
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            errors: vec![message.into()],
        }
    }
}

/// Applies a parsed backup to the application's data
pub trait RestoreApplier: Send + Sync {
    /// Apply each data category from the artifact, honoring the merge flag
    fn apply(&self, artifact: &BackupArtifact, options: &RestoreOptions) -> RestoreOutcome;
}

/// Validates, reads, and applies backup artifacts
pub struct RestoreEngine {
    paths: VaultPaths,
    applier: Arc<dyn RestoreApplier>,
    fs_lock: FileOpsLock,
}

impl RestoreEngine {
    /// Create a new restore engine
    pub fn new(paths: VaultPaths, applier: Arc<dyn RestoreApplier>, fs_lock: FileOpsLock) -> Self {
        Self {
            paths,
            applier,
            fs_lock,
        }
    }

    /// Restore application data from the named artifact
    ///
    /// Validation, I/O, and parse failures short-circuit into a failed
    /// outcome with a single descriptive error; the applier's outcome is
    /// returned verbatim otherwise.
    pub async fn restore(&self, filename: &str, options: &RestoreOptions) -> RestoreOutcome {
        match self.try_restore(filename, options).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(file = filename, error = %e, "restore failed");
                RestoreOutcome::failed(e.to_string())
            }
        }
    }

    async fn try_restore(
        &self,
        filename: &str,
        options: &RestoreOptions,
    ) -> VaultResult<RestoreOutcome> {
        let contents = self.read_artifact(filename).await?;

        let artifact: BackupArtifact = serde_json::from_str(&contents)
            .map_err(|e| VaultError::Json(format!("Failed to parse backup file: {}", e)))?;

        tracing::info!(
            file = filename,
            backup_id = %artifact.metadata.id,
            merge = options.merge,
            "applying restore"
        );
        Ok(self.applier.apply(&artifact, options))
    }

    /// Read the named artifact's raw contents, enforcing the size cap
    ///
    /// Shared with the command surface's read-backup operation. The
    /// filename and the resolved backup location are validated before the
    /// filesystem is touched; a file over [`MAX_RESTORE_BYTES`] is a
    /// validation failure, not a partial read.
    pub async fn read_artifact(&self, filename: &str) -> VaultResult<String> {
        validate_backup_filename(filename)?;

        let config = ScheduleConfig::load_or_default(&self.paths)?;
        let dir = config.backup_dir(&self.paths);
        validate_backup_location(&dir, self.paths.base_dir())?;

        let path = dir.join(filename);
        let _guard = self.fs_lock.acquire().await;

        let metadata = tokio::fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VaultError::backup_not_found(filename)
            } else {
                VaultError::Io(format!("Failed to stat backup file: {}", e))
            }
        })?;

        if metadata.len() > MAX_RESTORE_BYTES {
            return Err(VaultError::Validation(format!(
                "Backup file exceeds the {} MB read limit: {}",
                MAX_RESTORE_BYTES / (1024 * 1024),
                filename
            )));
        }

        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| VaultError::Io(format!("Failed to read backup file: {}", e)))
    }
}
