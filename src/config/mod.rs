//! Configuration and path management
//!
//! - `paths`: XDG-compliant resolution of the application data root
//! - `schedule`: the persisted backup schedule configuration

pub mod paths;
pub mod schedule;

pub use paths::VaultPaths;
pub use schedule::{BackupInterval, ScheduleConfig};
