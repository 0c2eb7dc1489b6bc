//! snapvault - Scheduled backup rotation and recovery for application data
//!
//! This library provides the core functionality for snapvault: a backup
//! subsystem that periodically snapshots an application's persisted data
//! to disk, enforces retention limits on artifact count and cumulative
//! size, and supports listing, reading, deleting, and restoring from any
//! retained snapshot.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `storage`: Atomic JSON file I/O and file-backed collaborators
//! - `backup`: Scheduler, engine, rotation, history, restore
//! - `service`: The request/response command surface
//! - `cli`: clap command handlers for the snapvault binary
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use snapvault::config::VaultPaths;
//! use snapvault::backup::LogNotifier;
//! use snapvault::service::BackupService;
//! use snapvault::storage::{FsDataStore, FsRestoreApplier};
//!
//! let paths = VaultPaths::new()?;
//! let service = BackupService::new(
//!     paths.clone(),
//!     env!("CARGO_PKG_VERSION"),
//!     Arc::new(FsDataStore::new(&paths)),
//!     Arc::new(FsRestoreApplier::new(&paths)),
//!     Arc::new(LogNotifier),
//! );
//! service.start()?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod service;
pub mod storage;

pub use error::VaultError;
