//! Rotation and retention policy
//!
//! Decides which backup artifacts exceed the configured count and size
//! limits and deletes them, oldest first. Planning is a pure function over
//! file metadata so the policy itself is trivially testable; the executor
//! deletes best-effort and then reconciles the history log against what
//! actually remains.
//!
//! Callers must hold the file-ops lock across `enforce_retention`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::history::HistoryStore;
use super::notify::BackupNotifier;
use super::validate::is_backup_filename;
use crate::config::ScheduleConfig;
use crate::error::{VaultError, VaultResult};

/// Metadata for one backup artifact on disk
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupFileMeta {
    /// Artifact filename
    pub filename: String,
    /// Full path to the artifact
    pub path: PathBuf,
    /// On-disk size in bytes
    pub size: u64,
    /// Modification time in epoch milliseconds
    pub modified_ms: i64,
}

/// List the backup artifacts in a directory, newest first
///
/// Sorting is by modification time, descending, and stable: artifacts with
/// equal modification times keep the directory-listing order. A missing
/// directory yields an empty list.
pub async fn scan_backup_dir(dir: &Path) -> VaultResult<Vec<BackupFileMeta>> {
    let mut files: Vec<(u128, BackupFileMeta)> = Vec::new();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(VaultError::Io(format!(
                "Failed to read backup directory {}: {}",
                dir.display(),
                e
            )))
        }
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| VaultError::Io(format!("Failed to read directory entry: {}", e)))?
    {
        let filename = entry.file_name().to_string_lossy().to_string();
        if !is_backup_filename(&filename) {
            continue;
        }

        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "skipping unreadable backup file");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        // Sort on the full-precision mtime; the surfaced field is truncated
        // to milliseconds.
        let modified_ns = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_nanos())
            .unwrap_or(0);

        files.push((
            modified_ns,
            BackupFileMeta {
                filename,
                path: entry.path(),
                size: metadata.len(),
                modified_ms: (modified_ns / 1_000_000) as i64,
            },
        ));
    }

    files.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(files.into_iter().map(|(_, meta)| meta).collect())
}

/// Compute which of `files` (sorted newest-first) must be deleted
///
/// Two rules, applied in order:
/// 1. Every file at position >= `max_count` is marked.
/// 2. While the cumulative size of the unmarked files still exceeds
///    `max_size_bytes`, the oldest unmarked file is marked next. Size
///    eviction never re-marks a file the count rule already took.
///
/// Returns the indices of marked files, oldest last.
pub fn plan_rotation(files: &[BackupFileMeta], max_count: u32, max_size_bytes: u64) -> Vec<usize> {
    if files.is_empty() {
        return Vec::new();
    }

    let keep = max_count as usize;
    let mut marked: Vec<usize> = (keep.min(files.len())..files.len()).collect();

    let mut retained_size: u64 = files.iter().take(keep).map(|f| f.size).sum();

    // Evict oldest retained files until the rest fit under the size cap.
    for index in (0..keep.min(files.len())).rev() {
        if retained_size <= max_size_bytes {
            break;
        }
        retained_size -= files[index].size;
        marked.push(index);
    }

    marked
}

/// Delete artifacts exceeding the retention limits and reconcile history
///
/// Deletion is best-effort: a failed single deletion is logged and skipped,
/// never blocking the rest of the batch. Returns the number of files
/// actually deleted.
pub async fn enforce_retention(
    dir: &Path,
    config: &ScheduleConfig,
    history: &HistoryStore,
    notifier: &dyn BackupNotifier,
) -> VaultResult<usize> {
    let files = scan_backup_dir(dir).await?;
    if files.is_empty() {
        return Ok(0);
    }

    let marked = plan_rotation(
        &files,
        config.max_backup_count,
        config.max_backup_size_bytes(),
    );

    let mut deleted: HashSet<usize> = HashSet::new();
    for &index in &marked {
        let file = &files[index];
        match tokio::fs::remove_file(&file.path).await {
            Ok(()) => {
                tracing::info!(file = %file.filename, size = file.size, "rotated out backup");
                deleted.insert(index);
            }
            Err(e) => {
                tracing::warn!(file = %file.filename, error = %e, "failed to delete rotated backup");
            }
        }
    }

    // Reconcile against what is truly left, including files whose deletion
    // failed and files removed behind our back.
    let remaining: HashSet<String> = scan_backup_dir(dir)
        .await?
        .into_iter()
        .map(|f| f.filename)
        .collect();

    if history.reconcile(&remaining)? {
        notifier.history_updated();
    }

    Ok(deleted.len())
}
