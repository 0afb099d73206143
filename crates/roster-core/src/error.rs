//! Error types for the roster migration engine.
//!
//! Errors fall into two groups. [`MigrationError`] is fatal and only raised
//! before any candidate is dispatched. [`MappingError`], [`TargetError`] and
//! [`CreationError`] are per-record: the orchestrator converts them into a
//! `failure` entry in the checkpoint and keeps going.

use std::path::PathBuf;
use thiserror::Error;

/// Run-level error. Aborts the job before dispatch.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A required collaborator (source or target) cannot be used.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Target unavailable: {0}")]
    Target(#[from] TargetError),
}

/// Result type alias for run-level operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

impl From<std::io::Error> for MigrationError {
    fn from(err: std::io::Error) -> Self {
        MigrationError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        MigrationError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl MigrationError {
    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        MigrationError::Configuration {
            message: message.into(),
        }
    }

    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        MigrationError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }
}

/// A source record could not be turned into a target payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("Missing unique key (uid) on source document {document_id}")]
    MissingKey { document_id: String },
}

/// Failure talking to the target API.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Target returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// HTTP 429 from the target.
    #[error("Rate limited by target: {message}")]
    RateLimited { message: String },

    #[error("Failed to decode target response: {message}")]
    Decode { message: String },

    #[error("Invalid target configuration: {message}")]
    InvalidConfig { message: String },
}

impl From<reqwest::Error> for TargetError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            TargetError::Decode {
                message: err.to_string(),
            }
        } else {
            TargetError::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Sanitized record creation failure.
///
/// The message is written verbatim into the checkpoint file, so it holds a
/// single human-readable line and never a raw transport error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CreationError {
    pub message: String,
}
