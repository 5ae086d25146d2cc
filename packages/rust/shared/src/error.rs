//! Error types for feedmill.
//!
//! Library crates use [`FeedmillError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all feedmill operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedmillError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network failure that survived every retry attempt.
    #[error("fetch failed after {attempts} attempt(s) for {url}: {last_error}")]
    Fetch {
        url: String,
        attempts: u32,
        last_error: String,
    },

    /// A response arrived but its status was not acceptable to the caller.
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Feed, JSON, or markup parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A single upstream record could not be mapped into a content record.
    #[error("malformed {source_name} record: {reason}")]
    MalformedRecord { source_name: String, reason: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Operator notification could not be delivered.
    #[error("notification error: {0}")]
    Notification(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FeedmillError>;

impl FeedmillError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a malformed-record error for the named source.
    pub fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error came from the network layer (after retries or on status).
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::HttpStatus { .. })
    }
}
