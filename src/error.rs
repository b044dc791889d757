//! Error handling module for the FOMOD engine
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Parse and merge failures propagate to the caller as a single `FomodError`
//! carrying the offending document, element or path.

use crate::types::GroupType;
use thiserror::Error;

/// Main error type for the FOMOD engine
#[derive(Error, Debug)]
pub enum FomodError {
    /// Malformed XML or a structurally required element is missing.
    /// The load is aborted and no partial model is returned.
    #[error("Failed to parse {document}: {reason}")]
    ManifestParse { document: String, reason: String },

    /// A group's cardinality rule is violated on page submission
    #[error("Group '{group}' requires {rule} but {selected} plugin(s) are selected")]
    Validation {
        group: String,
        rule: GroupType,
        selected: usize,
    },

    /// A user toggle was refused (forced type, unknown plugin, ...)
    #[error("Cannot change selection of '{plugin}': {reason}")]
    SelectionRejected { plugin: String, reason: String },

    /// A file descriptor references a path the archive does not contain
    #[error("Source file missing from archive: {path}")]
    MissingSourceFile { path: String },

    /// A file and a directory were both mapped onto the same destination path
    #[error("Destination path conflict: {path} is both a file and a directory")]
    DestinationConflict { path: String },

    /// Wizard navigation errors (terminal state, no such page)
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// IO errors (reading manifests, walking extracted archives)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, FomodError>;

// Convenient error constructors
impl FomodError {
    /// Create a manifest parse error for the given document
    pub fn parse(document: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ManifestParse {
            document: document.into(),
            reason: reason.into(),
        }
    }

    /// Create a selection rejection error
    pub fn rejected(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SelectionRejected {
            plugin: plugin.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing source file error
    pub fn missing_source(path: impl Into<String>) -> Self {
        Self::MissingSourceFile { path: path.into() }
    }

    /// Create a navigation error
    pub fn navigation(msg: impl Into<String>) -> Self {
        Self::Navigation(msg.into())
    }

    /// Returns true for errors the user can recover from by changing the selection
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::SelectionRejected { .. })
    }
}
