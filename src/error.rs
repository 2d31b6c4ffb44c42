//! # Checkpoint Error Types
//!
//! Structured error handling for checkpoint and restore operations using
//! thiserror. Most of these never reach callers of the hot-path entry points,
//! which log and absorb them; they exist so the internals can use `?`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint signal {key} is not set")]
    MissingSignal { key: String },

    #[error("Malformed checkpoint data in {context}: {message}")]
    Malformed { context: String, message: String },

    #[error("Variant serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Iterator '{name}' failed: {message}")]
    Iterator { name: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl CheckpointError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn iterator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Iterator {
            name: name.into(),
            message: message.into(),
        }
    }

    /// True when the error is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, CheckpointError>;
