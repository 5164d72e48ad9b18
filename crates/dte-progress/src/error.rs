// error.rs — Error types for storage backends and configuration.
//
// Only backends and config loading return these. The progress store, seen
// flags, scoring and the view swallow storage errors at their boundary and
// fall back to the most-locked state.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by a [`KeyValueStore`](crate::storage::KeyValueStore) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The key cannot be mapped onto the backend (empty, path separators, ...).
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// The backend refuses all access (disabled storage, quota, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while loading a [`ProgressConfig`](crate::config::ProgressConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config at {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Errors from an [`EventSink`](crate::events::EventSink).
#[derive(Debug, Error)]
pub enum EventError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
