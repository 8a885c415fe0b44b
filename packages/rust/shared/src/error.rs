//! Error types for MoodleGet.
//!
//! Library crates use [`MoodleGetError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all MoodleGet operations.
#[derive(Debug, thiserror::Error)]
pub enum MoodleGetError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport failure or non-success HTTP status.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// The portal re-rendered the login form instead of issuing a session key.
    #[error("invalid login, the portal rejected the credentials")]
    InvalidCredentials,

    /// An operation that needs a session was called before a successful login.
    #[error("not authenticated: call authenticate() first")]
    NotAuthenticated,

    /// The course-list service answered with an error envelope or an
    /// unusable structure.
    #[error("courses unavailable: {0}")]
    Backend(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// HTML-to-Markdown conversion error.
    #[error("conversion error: {0}")]
    Conversion(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MoodleGetError>;

impl MoodleGetError {
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

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = MoodleGetError::config("missing MOODLE_PASSWORD");
        assert_eq!(err.to_string(), "config error: missing MOODLE_PASSWORD");

        let err = MoodleGetError::Backend("empty response envelope".into());
        assert!(err.to_string().starts_with("courses unavailable"));
    }

    #[test]
    fn invalid_credentials_message() {
        let err = MoodleGetError::InvalidCredentials;
        assert!(err.to_string().contains("invalid login"));
    }
}
