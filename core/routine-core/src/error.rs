//! Error types for routine-core operations.

use std::path::PathBuf;

use crate::types::{BabyId, SessionId};

/// Collaborator call that failed, used to label remote errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Subscribe,
    Create,
    End,
    Delete,
}

impl StoreOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreOp::Subscribe => "subscribe",
            StoreOp::Create => "create session",
            StoreOp::End => "end session",
            StoreOp::Delete => "delete session",
        }
    }
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors that can occur in routine-core operations.
#[derive(Debug, thiserror::Error)]
pub enum RoutineError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Data directory could not be determined")]
    DataDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Session Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Cannot {action} while the timer is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    #[error("Activity view has been disposed")]
    Disposed,

    #[error("Session file is locked by another process: {path}")]
    StoreLocked { path: PathBuf },

    // ─────────────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Failed to {operation}: {details}")]
    Collaborator { operation: StoreOp, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Validation Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid {field}: {reason}")]
    InvalidOverride { field: &'static str, reason: String },

    // ─────────────────────────────────────────────────────────────────────
    // Application State Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Cannot {step} before {required}")]
    InitOrder {
        step: &'static str,
        required: &'static str,
    },

    #[error("No children have been added yet")]
    NoChildren,

    #[error("Unknown child: {0}")]
    UnknownChild(BabyId),
}

impl RoutineError {
    pub fn collaborator(operation: StoreOp, details: impl Into<String>) -> Self {
        RoutineError::Collaborator {
            operation,
            details: details.into(),
        }
    }

    pub fn invalid_override(field: &'static str, reason: impl Into<String>) -> Self {
        RoutineError::InvalidOverride {
            field,
            reason: reason.into(),
        }
    }

    /// True for errors the user can fix by editing the form and retrying.
    pub fn is_validation(&self) -> bool {
        matches!(self, RoutineError::InvalidOverride { .. })
    }
}

/// Convenience type alias for Results using RoutineError.
pub type Result<T> = std::result::Result<T, RoutineError>;

impl From<RoutineError> for String {
    fn from(err: RoutineError) -> String {
        err.to_string()
    }
}
