//! Persisted backup schedule configuration
//!
//! The schedule config drives the background scheduler: whether automatic
//! backups are enabled, how often they run, how many artifacts to retain,
//! and where artifacts are written. Field names on the wire are camelCase
//! to stay compatible with configs written by earlier releases.
//!
//! The config is only ever mutated through the validated `set` entry point
//! on [`BackupService`](crate::service::BackupService) and is persisted
//! immediately on each change with an atomic write.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::paths::VaultPaths;
use crate::error::VaultResult;
use crate::storage::file_io;

/// Lower bound for `max_backup_count`
pub const MIN_BACKUP_COUNT: u32 = 1;
/// Upper bound for `max_backup_count`
pub const MAX_BACKUP_COUNT: u32 = 50;
/// Lower bound for `max_backup_size_mb`
pub const MIN_BACKUP_SIZE_MB: u64 = 10;
/// Upper bound for `max_backup_size_mb`
pub const MAX_BACKUP_SIZE_MB: u64 = 1000;

/// How often scheduled backups run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackupInterval {
    /// Every 24 hours (default)
    #[default]
    Daily,
    /// Every 7 days
    Weekly,
    /// Every 30 days
    Monthly,
}

impl BackupInterval {
    /// Length of one interval in milliseconds
    pub fn interval_ms(&self) -> i64 {
        match self {
            BackupInterval::Daily => 24 * 60 * 60 * 1000,
            BackupInterval::Weekly => 7 * 24 * 60 * 60 * 1000,
            BackupInterval::Monthly => 30 * 24 * 60 * 60 * 1000,
        }
    }
}

impl std::fmt::Display for BackupInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackupInterval::Daily => write!(f, "daily"),
            BackupInterval::Weekly => write!(f, "weekly"),
            BackupInterval::Monthly => write!(f, "monthly"),
        }
    }
}

/// Backup schedule configuration
///
/// Timestamps are epoch milliseconds. `backup_location`, once set, must be
/// an absolute, normalized path nested under the application data root;
/// `None` means the default `backups/` directory under the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConfig {
    /// Whether automatic backups are enabled
    #[serde(default)]
    pub enabled: bool,

    /// Scheduled backup interval
    #[serde(default)]
    pub interval: BackupInterval,

    /// Maximum number of retained artifacts, clamped to [1, 50]
    #[serde(default = "default_max_backup_count")]
    pub max_backup_count: u32,

    /// Maximum cumulative artifact size in MB, clamped to [10, 1000]
    #[serde(rename = "maxBackupSizeMB", default = "default_max_backup_size_mb")]
    pub max_backup_size_mb: u64,

    /// When the last backup completed (epoch ms), if any
    #[serde(rename = "lastBackupTimestamp", default)]
    pub last_backup_at: Option<i64>,

    /// When the next scheduled backup is due (epoch ms), if armed
    #[serde(rename = "nextBackupTimestamp", default)]
    pub next_backup_at: Option<i64>,

    /// Explicit backup directory; `None` uses the default under the root
    #[serde(default)]
    pub backup_location: Option<PathBuf>,

    /// Run a backup before remote synchronization
    #[serde(default)]
    pub auto_backup_before_sync: bool,

    /// Run a backup before a matching pass
    #[serde(default)]
    pub auto_backup_before_match: bool,
}

fn default_max_backup_count() -> u32 {
    5
}

fn default_max_backup_size_mb() -> u64 {
    100
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: BackupInterval::default(),
            max_backup_count: default_max_backup_count(),
            max_backup_size_mb: default_max_backup_size_mb(),
            last_backup_at: None,
            next_backup_at: None,
            backup_location: None,
            auto_backup_before_sync: false,
            auto_backup_before_match: false,
        }
    }
}

impl ScheduleConfig {
    /// Clamp count and size limits into their allowed ranges
    pub fn clamp_limits(&mut self) {
        self.max_backup_count = self
            .max_backup_count
            .clamp(MIN_BACKUP_COUNT, MAX_BACKUP_COUNT);
        self.max_backup_size_mb = self
            .max_backup_size_mb
            .clamp(MIN_BACKUP_SIZE_MB, MAX_BACKUP_SIZE_MB);
    }

    /// The size limit in bytes
    pub fn max_backup_size_bytes(&self) -> u64 {
        self.max_backup_size_mb * 1024 * 1024
    }

    /// Resolve the effective backup directory for this config
    pub fn backup_dir(&self, paths: &VaultPaths) -> PathBuf {
        self.backup_location
            .clone()
            .unwrap_or_else(|| paths.default_backup_dir())
    }

    /// Load the config from disk, or return defaults if the file doesn't exist
    ///
    /// Limits are re-clamped on load so a hand-edited file cannot smuggle
    /// out-of-range values past the `set` entry point.
    pub fn load_or_default(paths: &VaultPaths) -> VaultResult<Self> {
        let mut config: ScheduleConfig = file_io::read_json(paths.schedule_file())?;
        config.clamp_limits();
        Ok(config)
    }

    /// Persist the config to disk atomically
    pub fn save(&self, paths: &VaultPaths) -> VaultResult<()> {
        paths.ensure_directories()?;
        file_io::write_json_atomic(paths.schedule_file(), self)
    }
}
