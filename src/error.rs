//! Error types for upload storage and format generation.

use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: data {data:?}, format {format:?}")]
    NotFound {
        data: String,
        format: Option<String>,
    },

    #[error("Invalid data token: {0}")]
    InvalidToken(String),

    #[error("Failed to write data {data:?} (format {format:?}): {reason}")]
    WriteFailed {
        data: String,
        format: Option<String>,
        reason: String,
    },

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StorageError {
    pub(crate) fn not_found(data: &str, format: Option<&str>) -> Self {
        StorageError::NotFound {
            data: data.to_string(),
            format: format.map(str::to_string),
        }
    }
}

/// Errors raised by contexts, formatters and the generation engine
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown context '{0}'")]
    UnknownContext(String),

    #[error("Invalid {kind} name {name:?} (must match ^[a-z0-9_-]+$)")]
    InvalidName { kind: &'static str, name: String },

    #[error("Context '{context}' has no formatter '{format}'")]
    UnknownFormat { context: String, format: String },

    #[error("Cycle in formatter hierarchy: formatter '{formatter}' in context '{context}'")]
    Cycle { formatter: String, context: String },

    #[error("Context '{context}' failed to persist format '{format}' for data {data:?}: {source}")]
    PersistFailed {
        context: String,
        data: String,
        format: String,
        #[source]
        source: StorageError,
    },

    #[error("Formatter '{formatter}' failed: {message}")]
    Transform { formatter: String, message: String },

    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ContextError {
    /// True for the configuration class of failures: malformed setup, unknown
    /// references, cycles, and artifacts that could not be persisted.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ContextError::Config(_)
                | ContextError::UnknownContext(_)
                | ContextError::InvalidName { .. }
                | ContextError::UnknownFormat { .. }
                | ContextError::Cycle { .. }
                | ContextError::PersistFailed { .. }
        )
    }

    /// True when a required `(data, format)` pair was missing from storage.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ContextError::StorageError(StorageError::NotFound { .. })
        )
    }
}

impl From<config::ConfigError> for ContextError {
    fn from(err: config::ConfigError) -> Self {
        ContextError::Config(err.to_string())
    }
}
