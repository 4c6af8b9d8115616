//! Error types for Foreman operations

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

/// Persistence layer errors. Both variants are fatal for the current
/// invocation: no partial state mutation is committed once one surfaces.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("State document at {path} is corrupt: {reason}")]
    CorruptState { path: String, reason: String },

    #[error("I/O failure on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Timed out waiting for the state guard at {path}")]
    GuardTimeout { path: String },
}

impl StoreError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        StoreError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    /// Wrap a deserialization error as a corrupt-state report.
    pub fn corrupt(path: &Path, err: impl std::fmt::Display) -> Self {
        StoreError::CorruptState {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Orchestration engine errors. `Conflicts` and `AlreadyRegistered` are
/// expected, recoverable outcomes carried as values; `Store` failures are
/// fatal for the invocation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Worker instance not found: {instance}")]
    NotFound { instance: String },

    #[error("Worker instance already registered: {instance}")]
    AlreadyRegistered { instance: String },

    #[error("File conflicts detected on {} file(s)", conflicts.len())]
    Conflicts {
        /// Map of contested file path to the id of the worker holding it.
        conflicts: BTreeMap<String, String>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// TESTS
// =============================================================================
