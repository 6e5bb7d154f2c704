//! Error types for reconciliation.
//!
//! Errors are categorized so callers can tell a malformed descriptor (abort
//! before any I/O) from a rejected operation (isolated to one resource) from
//! slow propagation (a warning, the operation may well have succeeded).

use crate::types::Operation;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Desired state is self-contradictory or incomplete
    Validation,
    /// A referenced dependent resource does not exist
    NotFound,
    /// The external system rejected an operation
    Apply,
    /// Observed state did not converge within the timeout
    ConvergenceTimeout,
    /// Descriptor or device file could not be read or parsed
    Input,
    /// Anything else reported by an external collaborator
    Backend,
}

impl ErrorKind {
    /// Whether this kind is reported as a warning rather than a failure.
    ///
    /// A convergence timeout does not mean the operations failed, only that
    /// the expected state was not observed in time.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::ConvergenceTimeout)
    }

    /// Whether re-running the whole invocation may help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Apply | Self::ConvergenceTimeout | Self::Backend)
    }

    /// Get a user-friendly description of this error kind.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid desired state",
            Self::NotFound => "Referenced resource not found",
            Self::Apply => "Operation rejected",
            Self::ConvergenceTimeout => "Convergence not observed in time",
            Self::Input => "Unreadable input",
            Self::Backend => "External system error",
        }
    }
}

/// Errors that can occur while loading, diffing, applying or verifying.
#[derive(Debug, Error)]
pub enum Error {
    /// Desired-state descriptor is self-contradictory or incomplete
    #[error("validation failed{}: {message}", key_suffix(.key))]
    Validation {
        /// Resource the problem was found on, if any
        key: Option<String>,
        /// What is wrong
        message: String,
    },

    /// A referenced dependent resource does not exist
    #[error("{key}: referenced {reference} does not exist")]
    NotFound {
        /// Resource whose operation needed the reference
        key: String,
        /// The missing resource, e.g. `interface Ethernet1/9`
        reference: String,
    },

    /// The external system rejected an operation
    #[error("{operation} on {key} rejected: {detail}")]
    Apply {
        /// Resource the operation targeted
        key: String,
        /// Operation kind label
        operation: String,
        /// Raw error detail from the external system
        detail: String,
    },

    /// Post-apply verification still saw a diff after the timeout
    #[error(
        "state did not converge after {}s ({} operation(s) outstanding)",
        .waited.as_secs(),
        .residual.len()
    )]
    ConvergenceTimeout {
        /// How long verification waited
        waited: Duration,
        /// Operations that would still be needed
        residual: Vec<Operation>,
    },

    /// Descriptor could not be parsed
    #[error("invalid descriptor{}: {message}", path_suffix(.path))]
    Descriptor {
        /// Source file, when loaded from disk
        path: Option<PathBuf>,
        /// Parser message
        message: String,
    },

    /// File could not be read or written
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Error reported by an external collaborator
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl Error {
    /// Build a validation error attached to one resource.
    pub fn validation(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            key: Some(key.into()),
            message: message.into(),
        }
    }

    /// Build a validation error for the descriptor as a whole.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            key: None,
            message: message.into(),
        }
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Apply { .. } => ErrorKind::Apply,
            Self::ConvergenceTimeout { .. } => ErrorKind::ConvergenceTimeout,
            Self::Descriptor { .. } | Self::Io { .. } => ErrorKind::Input,
            Self::Backend(_) => ErrorKind::Backend,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

fn key_suffix(key: &Option<String>) -> String {
    key.as_ref().map(|k| format!(" for {k}")).unwrap_or_default()
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" {}", p.display()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_resource() {
        let err = Error::validation("vlan 5000", "vlan_id must be between 1 and 4094");
        assert_eq!(
            err.to_string(),
            "validation failed for vlan 5000: vlan_id must be between 1 and 4094"
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_descriptor_without_key() {
        let err = Error::invalid("aggregate and resource are mutually exclusive");
        assert_eq!(
            err.to_string(),
            "validation failed: aggregate and resource are mutually exclusive"
        );
    }

    #[test]
    fn test_timeout_is_warning() {
        let err = Error::ConvergenceTimeout {
            waited: Duration::from_secs(3),
            residual: Vec::new(),
        };
        assert!(err.kind().is_warning());
        assert!(err.kind().is_retryable());
        assert!(!ErrorKind::Apply.is_warning());
        assert!(!ErrorKind::Validation.is_retryable());
    }

    #[test]
    fn test_backend_errors_keep_context() {
        let err: Error = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.kind(), ErrorKind::Backend);
        assert_eq!(err.to_string(), "connection reset");
    }
}
