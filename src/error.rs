//! Error types for ontolink.
//!
//! All errors are strongly typed using thiserror. Retrieval and persistence
//! failures propagate to the caller; failing to disambiguate a mention is
//! never an error and is encoded as the absence of a mapping.

use std::path::PathBuf;

use thiserror::Error;

/// Validation errors raised before any state is mutated.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Row count mismatch: {embeddings} embeddings but {metadata} metadata rows")]
    RowCountMismatch {
        embeddings: usize,
        metadata: usize,
    },

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    InvalidEmbeddingDimension {
        actual: usize,
        expected: usize,
    },

    #[error("Identifier '{idx}' appears more than once in metadata")]
    DuplicateIdentifier {
        idx: String,
    },

    #[error("Synonym '{synonym}' references unknown identifier '{idx}'")]
    UnknownIdentifier {
        synonym: String,
        idx: String,
    },

    #[error("Index name cannot be empty")]
    EmptyIndexName,

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Errors raised by candidate indices and their on-disk artifacts.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Artifact directory or file is missing, or holds a differently named index.
    #[error("Index artifact not found: {0}")]
    NotFound(PathBuf),

    /// The artifact was written by a different index kind.
    #[error("Index kind mismatch: expected {expected}, found {found}")]
    KindMismatch {
        expected: String,
        found: String,
    },

    /// A backend failed its capability probe at construction.
    #[error("Index backend '{backend}' is unavailable: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// Checksum or framing failure while reading an artifact.
    #[error("Corrupted index artifact: {0}")]
    Corrupted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors raised while scheduling or waiting on document processing.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Worker queue is full (capacity: {capacity})")]
    QueueFull {
        capacity: usize,
    },

    #[error("Worker pool disconnected")]
    Disconnected,

    #[error("Operation timed out after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    #[error("Vectorizer build already in progress at {path}")]
    BuildInProgress {
        path: PathBuf,
    },
}

/// Top-level error type for ontolink.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl LinkError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Index(IndexError::Validation(_)))
    }

    /// Returns true if this is an index error.
    #[must_use]
    pub const fn is_index(&self) -> bool {
        matches!(self, Self::Index(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if the same call may succeed later.
    ///
    /// Configuration and I/O failures are fatal; only scheduling pressure and a
    /// concurrent vectorizer build are transient.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Execution(e) => matches!(
                e,
                ExecutionError::QueueFull { .. }
                    | ExecutionError::Timeout { .. }
                    | ExecutionError::BuildInProgress { .. }
            ),
            _ => false,
        }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        Self::Index(IndexError::Io(err))
    }
}

/// Result type alias for ontolink operations.
pub type LinkResult<T> = Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_count_mismatch_message() {
        let err = ValidationError::RowCountMismatch {
            embeddings: 3,
            metadata: 2,
        };
        let msg = format!("{err}");
        assert!(msg.contains("3 embeddings"));
        assert!(msg.contains("2 metadata"));
    }

    #[test]
    fn test_not_found_message() {
        let err = IndexError::NotFound(PathBuf::from("/tmp/missing_index"));
        assert!(err.to_string().contains("missing_index"));
    }

    #[test]
    fn test_backend_unavailable_message() {
        let err = IndexError::BackendUnavailable {
            backend: "flat_l2",
            reason: "compiled without flat-index".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("flat_l2"));
        assert!(msg.contains("unavailable"));
    }

    #[test]
    fn test_link_error_from_validation() {
        let err: LinkError = ValidationError::EmptyIndexName.into();
        assert!(err.is_validation());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_nested_validation_counts_as_validation() {
        let err: LinkError = IndexError::Validation(ValidationError::EmptyIndexName).into();
        assert!(err.is_validation());
        assert!(err.is_index());
    }

    #[test]
    fn test_link_error_retryable() {
        let err: LinkError = ExecutionError::QueueFull { capacity: 4 }.into();
        assert!(err.is_execution());
        assert!(err.is_retryable());

        let err: LinkError = ExecutionError::Disconnected.into();
        assert!(!err.is_retryable());

        let err: LinkError = IndexError::NotFound(PathBuf::from("x")).into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_link_error_internal() {
        let err = LinkError::internal("unexpected state");
        let msg = format!("{err}");
        assert!(msg.contains("unexpected state"));
    }
}
