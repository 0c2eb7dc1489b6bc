//! Backup subsystem for snapvault
//!
//! Periodically snapshots the application's persisted data to disk,
//! enforces retention limits on artifact count and cumulative size, and
//! supports listing, reading, deleting, and restoring from any retained
//! snapshot.
//!
//! # Architecture
//!
//! - `validate`: pure path/filename validation, applied before any I/O
//! - `fs_lock`: FIFO lock serializing create/rotate/delete operations
//! - `history`: persisted backup log, reconciled against on-disk truth
//! - `rotation`: count/size retention planning and best-effort deletion
//! - `engine`: one backup run end to end
//! - `scheduler`: timers, catch-up runs, deferred config updates
//! - `restore`: validated artifact reads handed to a restore collaborator
//! - `notify`: lifecycle events pushed to the embedding application
//!
//! # Control Flow
//!
//! Scheduler fires → engine (under the file-ops lock) writes the artifact
//! → history is updated → rotation deletes excess artifacts → history is
//! reconciled → notifications are emitted. Restores and manual deletes
//! enter through the same lock independently.

pub mod engine;
pub mod fs_lock;
pub mod history;
pub mod notify;
pub mod restore;
pub mod rotation;
pub mod scheduler;
pub mod validate;

pub use engine::{
    BackupArtifact, BackupEngine, BackupMode, BackupOutcome, DataStore, JsonPayloadBuilder,
    PayloadBuilder,
};
pub use fs_lock::FileOpsLock;
pub use history::{HistoryEntry, HistoryStore};
pub use notify::{BackupCompleted, BackupNotifier, LogNotifier, SchedulerStatus};
pub use restore::{RestoreApplier, RestoreEngine, RestoreOptions, RestoreOutcome};
pub use rotation::BackupFileMeta;
pub use scheduler::{BackupScheduler, SchedulerPhase};
