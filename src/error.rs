//! Custom error types for snapvault
//!
//! This module defines the error hierarchy for the backup subsystem using
//! thiserror for ergonomic error definitions.

use thiserror::Error;

/// The main error type for snapvault operations
#[derive(Error, Debug)]
pub enum VaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// Validation errors for paths, filenames, and config values.
    /// Raised before any filesystem call is made.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Storage errors (persisted config and history files)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// A backup workflow is already active
    #[error("A backup is already in progress")]
    BackupInProgress,

    /// Restore errors
    #[error("Restore error: {0}")]
    Restore(String),
}

impl VaultError {
    /// Create a "not found" error for backup artifacts
    pub fn backup_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Backup",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for snapvault operations
pub type VaultResult<T> = Result<T, VaultError>;
