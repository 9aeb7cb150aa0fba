//! Error types for the PTM harvester.
//!
//! Errors fall into two groups. Row-level errors (a malformed record, a
//! constraint violation while loading one model, a failed fetch) are caught at
//! the row boundary by the batch drivers, logged with the record's
//! `context_id`, and skipped. Structural errors (an unknown table or hub, bad
//! configuration) abort the run immediately.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the PTM harvester.
#[derive(Debug, Error)]
pub enum PtmError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// HTTP status when the server answered
        status_code: Option<u16>,
    },

    #[error("GraphQL error: {message}")]
    GraphQl { message: String },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    // Transformation errors
    #[error("Mapping for field '{field}' failed: {message}")]
    Mapping { field: String, message: String },

    #[error("Malformed record {context_id}: {message}")]
    Malformed { context_id: String, message: String },

    // Structural errors
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown model hub: {0}")]
    UnknownHub(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Model not found: {0}")]
    ModelNotFound(i64),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, PtmError>;

impl From<std::io::Error> for PtmError {
    fn from(err: std::io::Error) -> Self {
        PtmError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for PtmError {
    fn from(err: serde_json::Error) -> Self {
        PtmError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for PtmError {
    fn from(err: rusqlite::Error) -> Self {
        PtmError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for PtmError {
    fn from(err: reqwest::Error) -> Self {
        PtmError::Network {
            message: err.to_string(),
            status_code: err.status().map(|s| s.as_u16()),
        }
    }
}

impl PtmError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        PtmError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether a batch driver may record this error against one row and keep going.
    ///
    /// Structural errors are never recoverable: they mean the run itself is
    /// misconfigured, so every following row would fail the same way.
    pub fn is_row_recoverable(&self) -> bool {
        !matches!(
            self,
            PtmError::UnknownTable(_) | PtmError::UnknownHub(_) | PtmError::Config { .. }
        )
    }

    /// Whether this error came from talking to a remote hub.
    pub fn is_transient(&self) -> bool {
        matches!(self, PtmError::Network { .. } | PtmError::GraphQl { .. })
    }
}
