//! Error types for newsdesk.
//!
//! Library crates use [`NewsdeskError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all newsdesk operations.
#[derive(Debug, thiserror::Error)]
pub enum NewsdeskError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A single source could not be fetched or parsed. The cycle skips it.
    #[error("fetch error [{source_name}]: {message}")]
    Fetch {
        source_name: String,
        message: String,
    },

    /// Anti-automation page or access denial. Callers escalate to a heavier strategy.
    #[error("blocked: {0}")]
    Blocked(String),

    /// No usable text could be extracted.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Classifier output did not match the expected shape.
    #[error("classifier returned an unexpected shape: {0}")]
    ClassificationShape(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Headless browser launch or CDP error.
    #[error("browser error: {0}")]
    Browser(String),

    /// LLM transport or response error.
    #[error("llm error: {0}")]
    Llm(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid format, unknown enum value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, NewsdeskError>;

impl NewsdeskError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a per-source fetch error.
    pub fn fetch(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether a heavier strategy should be tried after this error.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }
}
