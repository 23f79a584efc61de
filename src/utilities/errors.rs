//! Shared error types.
//!
//! Module-specific failures (LLM calls, firefly lifecycle, simulations) live
//! next to the code that raises them; this module holds the errors that
//! several modules share: storage, configuration and enum parsing.

use thiserror::Error;

/// Errors raised by the SQLite-backed stores.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying SQLite failure.
    #[error("Database operation error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("Database serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The database directory could not be created.
    #[error("Database directory error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking worker running the query panicked or was cancelled.
    #[error("Database task failed: {message}")]
    Task { message: String },

    /// A referenced record does not exist.
    #[error("Record not found: {id}")]
    NotFound { id: String },
}

/// Errors raised while loading [`AppConfig`](crate::utilities::config::AppConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// A string did not name any variant of a categorical enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind} value: '{value}'")]
pub struct UnknownVariant {
    /// Enum the value was parsed as.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}
