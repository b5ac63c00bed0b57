//! Error types for notesync.
//!
//! This module defines all error types used throughout the library, and the
//! classification the sync engine relies on: transient failures are retried on
//! the next cycle, permanent ones are settled per note, everything else is
//! fatal and propagated to the caller.

use thiserror::Error;

/// Result type alias for notesync operations
pub type NoteResult<T> = Result<T, NoteError>;

/// Main error type for notesync operations
#[derive(Error, Debug)]
pub enum NoteError {
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database operation failed: {0}")]
    DatabaseOperation(String),

    /// Remote store unreachable (connection refused, DNS, timeout).
    #[error("Network error: {0}")]
    Network(String),

    /// Remote store answered, but not usefully (5xx, unparseable body).
    #[error("Sync error: {0}")]
    Sync(String),

    /// Remote store refused the request (4xx other than 404).
    #[error("Rejected by remote store (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl NoteError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        NoteError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new sync error
    pub fn sync(message: impl Into<String>) -> Self {
        NoteError::Sync(message.into())
    }

    /// Create a new database operation error
    pub fn database_op(message: impl Into<String>) -> Self {
        NoteError::DatabaseOperation(message.into())
    }

    /// Create a new rejection error
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        NoteError::Rejected {
            status,
            message: message.into(),
        }
    }

    /// The operation may succeed if retried later, unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, NoteError::Network(_) | NoteError::Sync(_))
    }

    /// The remote store has settled this request; retrying verbatim is pointless.
    pub fn is_permanent(&self) -> bool {
        matches!(self, NoteError::Rejected { .. } | NoteError::NotFound(_))
    }
}

impl From<reqwest::Error> for NoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            NoteError::Sync(format!("Failed to parse response: {}", err))
        } else {
            NoteError::Network(err.to_string())
        }
    }
}

/// Validation error with field and message
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for NoteError {
    fn from(err: ValidationError) -> Self {
        NoteError::Validation {
            field: err.field,
            message: err.message,
        }
    }
}
