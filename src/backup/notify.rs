//! Push notifications emitted by the backup subsystem
//!
//! The subsystem reports lifecycle events through the [`BackupNotifier`]
//! trait so the embedding application can forward them to whatever surface
//! it has (UI event bus, IPC channel, log). The shipped [`LogNotifier`]
//! writes events to the tracing log and is the default for the CLI.

use serde::{Deserialize, Serialize};

/// Payload of a backup-complete notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupCompleted {
    /// Identifier of the new backup
    pub backup_id: String,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
}

/// Payload of a status-changed notification, also returned by status queries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    /// Whether a backup workflow is active right now
    pub is_running: bool,
    /// When the last backup completed (epoch ms), if any
    pub last_backup: Option<i64>,
    /// When the next scheduled backup is due (epoch ms), if armed
    pub next_backup: Option<i64>,
}

/// Receiver for backup lifecycle events
///
/// Implementations must be cheap and non-blocking; they are called from
/// inside backup workflows.
pub trait BackupNotifier: Send + Sync {
    /// A backup run completed successfully
    fn backup_completed(&self, event: BackupCompleted);

    /// A backup run aborted with an error
    fn backup_error(&self, message: &str);

    /// The history log changed; observers should re-fetch it
    fn history_updated(&self);

    /// The scheduler's status changed
    fn status_changed(&self, status: SchedulerStatus);
}

/// Notifier that writes every event to the tracing log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl BackupNotifier for LogNotifier {
    fn backup_completed(&self, event: BackupCompleted) {
        tracing::info!(
            backup_id = %event.backup_id,
            timestamp = event.timestamp,
            "backup complete"
        );
    }

    fn backup_error(&self, message: &str) {
        tracing::error!(error = %message, "backup failed");
    }

    fn history_updated(&self) {
        tracing::debug!("backup history updated");
    }

    fn status_changed(&self, status: SchedulerStatus) {
        tracing::debug!(
            is_running = status.is_running,
            last_backup = ?status.last_backup,
            next_backup = ?status.next_backup,
            "scheduler status changed"
        );
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_shape() {
        let status = SchedulerStatus {
            is_running: true,
            last_backup: Some(1_700_000_000_000),
            next_backup: None,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("isRunning"));
        assert!(json.contains("lastBackup"));
        assert!(json.contains("nextBackup"));
    }

    #[test]
    fn test_log_notifier_is_callable() {
        let notifier = LogNotifier;
        notifier.backup_completed(BackupCompleted {
            backup_id: "abc".into(),
            timestamp: 1,
        });
        notifier.backup_error("nope");
        notifier.history_updated();
        notifier.status_changed(SchedulerStatus {
            is_running: false,
            last_backup: None,
            next_backup: None,
        });
    }
}
