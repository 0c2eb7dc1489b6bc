//! Storage layer for snapvault
//!
//! - `file_io`: atomic JSON read/write helpers used by config and history
//! - `appdata`: file-backed data store and restore applier for the binary

pub mod appdata;
pub mod file_io;

pub use appdata::{FsDataStore, FsRestoreApplier};
