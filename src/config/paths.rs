//! Path management for snapvault
//!
//! Provides XDG-compliant path resolution for the application data root,
//! persisted configuration, backup history, and the default backup directory.
//!
//! ## Path Resolution Order
//!
//! 1. `SNAPVAULT_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/snapvault` or `~/.config/snapvault`
//! 3. Windows: `%APPDATA%\snapvault`
//!
//! The data root doubles as the confinement boundary: every configured
//! backup location must resolve to a directory nested under it.

use std::path::PathBuf;

use crate::error::VaultError;

/// Manages all paths used by snapvault
#[derive(Debug, Clone)]
pub struct VaultPaths {
    /// Base directory for all snapvault data (the private data root)
    base_dir: PathBuf,
}

impl VaultPaths {
    /// Create a new VaultPaths instance
    ///
    /// Path resolution:
    /// 1. `SNAPVAULT_DATA_DIR` env var (explicit override)
    /// 2. Unix: `$XDG_CONFIG_HOME/snapvault` or `~/.config/snapvault`
    /// 3. Windows: `%APPDATA%\snapvault`
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new() -> Result<Self, VaultError> {
        let base_dir = if let Ok(custom) = std::env::var("SNAPVAULT_DATA_DIR") {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create VaultPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.config/snapvault/ or equivalent)
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the application data directory (~/.config/snapvault/data/)
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the default backup directory (~/.config/snapvault/backups/)
    ///
    /// Used whenever no explicit backup location is configured.
    pub fn default_backup_dir(&self) -> PathBuf {
        self.base_dir.join("backups")
    }

    /// Get the path to the persisted schedule config file
    pub fn schedule_file(&self) -> PathBuf {
        self.base_dir.join("schedule.json")
    }

    /// Get the path to the persisted backup history file
    pub fn history_file(&self) -> PathBuf {
        self.base_dir.join("backup-history.json")
    }

    /// Ensure all required directories exist
    ///
    /// Creates:
    /// - Base directory (~/.config/snapvault/)
    /// - Data directory (~/.config/snapvault/data/)
    pub fn ensure_directories(&self) -> Result<(), VaultError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| VaultError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| VaultError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }
}

/// Resolve the default data directory path based on platform
#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, VaultError> {
    // Unix (Linux/macOS): Use XDG_CONFIG_HOME if set, otherwise ~/.config
    let config_base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
    Ok(config_base.join("snapvault"))
}

/// Resolve the default data directory path based on platform
#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, VaultError> {
    // Windows: Use APPDATA
    let appdata = std::env::var("APPDATA")
        .map_err(|_| VaultError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("snapvault"))
}
