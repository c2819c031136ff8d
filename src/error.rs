//! Error types for the chat-storage library
//!
//! This module provides a unified error handling system using `thiserror` for
//! all components of the library. Read paths never surface decode failures
//! (those become "absent"), so most variants here describe write failures or
//! a broken primitive.

use thiserror::Error;

/// The main error type for the chat-storage library
#[derive(Error, Debug)]
pub enum Error {
    /// Storage operation errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// JSON encoding/decoding errors outside a storage boundary
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// The underlying primitive rejected a write, or the value could not be encoded
    #[error("Failed to store value for key \"{key}\": {reason}")]
    WriteFailed { key: String, reason: String },

    /// The write would push the store past its byte quota
    #[error("Storage quota exceeded for key \"{key}\": {required} bytes needed, limit is {limit}")]
    QuotaExceeded {
        key: String,
        required: usize,
        limit: usize,
    },

    /// The key cannot be represented by this backend
    #[error("Invalid storage key \"{key}\": {reason}")]
    InvalidKey { key: String, reason: String },

    /// An inter-process call failed on the host side
    #[error("IPC call {channel} failed: {reason}")]
    Ipc { channel: String, reason: String },

    /// The host process went away
    #[error("IPC channel closed")]
    ChannelClosed,

    /// Storage backend not available
    #[error("Storage backend not available: {backend}")]
    BackendNotAvailable { backend: String },

    /// Storage operation failed
    #[error("Storage operation failed: {operation}: {reason}")]
    OperationFailed { operation: String, reason: String },

    /// SQLite operation failed
    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::OperationFailed {
            operation: "blocking_task".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::config::StorageConfig`]
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A field holds an unusable value
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Unknown platform name
    #[error("Unknown platform: {name} (expected desktop, mobile or web)")]
    UnknownPlatform { name: String },
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

/// Convenience type alias for Storage Results
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Convenience type alias for Config Results
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
