//! Error types for the eztemplates crate.
//!
//! Stack-discipline violations on change scopes are not represented here:
//! they are programming errors and panic at the call site. Everything in this
//! module is a recoverable condition that callers may log and skip.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for eztemplates operations.
#[derive(Debug, Error)]
pub enum EzTemplatesError {
    /// A field on a host job could not be read or written.
    #[error("{0}")]
    FieldAccess(#[from] FieldAccessError),

    /// The host failed to persist or reconfigure a job.
    #[error("{0}")]
    Host(#[from] HostError),

    /// A job name did not resolve in the repository.
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// An exclusion id did not resolve in the registry.
    #[error("Unknown exclusion: {0}")]
    UnknownExclusion(String),

    /// A snapshot was handed to an exclusion that did not capture it.
    #[error("Exclusion '{expected}' cannot restore a snapshot captured by '{actual}'")]
    SnapshotMismatch {
        /// The exclusion asked to restore.
        expected: String,
        /// The exclusion that produced the snapshot.
        actual: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The tracing subscriber could not be installed.
    #[error("Failed to install tracing subscriber: {0}")]
    Logging(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = EzTemplatesError> = std::result::Result<T, E>;

/// Why a field access failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldAccessKind {
    /// The job model has no such field (usually host version skew).
    Missing,
    /// The field exists but holds a value of a different type.
    TypeMismatch,
}

impl std::fmt::Display for FieldAccessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::TypeMismatch => write!(f, "type mismatch"),
        }
    }
}

/// Error raised when a job field cannot be read or written.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Field '{field}' on job '{job}' is not accessible ({kind})")]
pub struct FieldAccessError {
    /// Full name of the job.
    pub job: String,
    /// The field that was accessed.
    pub field: String,
    /// What went wrong.
    pub kind: FieldAccessKind,
}

impl FieldAccessError {
    /// Creates a new field access error.
    #[must_use]
    pub fn new(job: impl Into<String>, field: impl Into<String>, kind: FieldAccessKind) -> Self {
        Self {
            job: job.into(),
            field: field.into(),
            kind,
        }
    }

    /// Shorthand for a missing field.
    #[must_use]
    pub fn missing(job: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(job, field, FieldAccessKind::Missing)
    }

    /// Shorthand for a field holding an unexpected type.
    #[must_use]
    pub fn type_mismatch(job: impl Into<String>, field: impl Into<String>) -> Self {
        Self::new(job, field, FieldAccessKind::TypeMismatch)
    }
}

/// Error reported by the host job model.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Host error on job '{job}': {message}")]
pub struct HostError {
    /// Full name of the job.
    pub job: String,
    /// The host's message.
    pub message: String,
}

impl HostError {
    /// Creates a new host error.
    #[must_use]
    pub fn new(job: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_access_error_display() {
        let err = FieldAccessError::missing("folder/app", "disabled");
        assert_eq!(
            err.to_string(),
            "Field 'disabled' on job 'folder/app' is not accessible (missing)"
        );
    }

    #[test]
    fn test_field_access_converts_into_crate_error() {
        let err: EzTemplatesError = FieldAccessError::type_mismatch("app", "triggers").into();
        assert!(matches!(err, EzTemplatesError::FieldAccess(ref e) if e.kind == FieldAccessKind::TypeMismatch));
    }

    #[test]
    fn test_snapshot_mismatch_display() {
        let err = EzTemplatesError::SnapshotMismatch {
            expected: "disabled".to_string(),
            actual: "description".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Exclusion 'disabled' cannot restore a snapshot captured by 'description'"
        );
    }

    #[test]
    fn test_host_error_display() {
        let err = EzTemplatesError::from(HostError::new("app", "disk full"));
        assert_eq!(err.to_string(), "Host error on job 'app': disk full");
    }
}
