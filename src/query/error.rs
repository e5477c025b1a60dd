//! Errors raised by the query subsystem.

use thiserror::Error;

/// Errors that can occur while defining, registering or executing queries.
///
/// Lenient execution never produces `NotFound` or `LanguageMismatch`; those
/// only surface from the strict variants.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("query not found: {0}")]
    NotFound(String),

    #[error("query '{key}' does not support language '{language}'")]
    LanguageMismatch { key: String, language: String },

    #[error("query '{0}' is already registered")]
    Duplicate(String),

    #[error("invalid query definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("processor for '{key}' failed: {source}")]
    Processor {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("processor for '{key}' panicked: {message}")]
    Panicked { key: String, message: String },

    #[error("failed to encode result of '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode result of '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    #[error("invalid pattern for query '{key}': {message}")]
    Pattern { key: String, message: String },
}

impl QueryError {
    /// Wrap a processor failure for the given query key.
    pub fn processor(key: &str, err: anyhow::Error) -> Self {
        QueryError::Processor {
            key: key.to_string(),
            source: err.into(),
        }
    }

    /// Whether this error is a lookup miss (unknown key or language).
    pub fn is_lookup_miss(&self) -> bool {
        matches!(
            self,
            QueryError::NotFound(_) | QueryError::LanguageMismatch { .. }
        )
    }
}
