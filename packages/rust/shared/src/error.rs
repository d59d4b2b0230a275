//! Error types for repoharvest.
//!
//! Library crates use [`HarvestError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all run-fatal repoharvest failures.
///
/// Per-repository clone failures never become a `HarvestError`; they are
/// recorded in a [`CloneOutcome`](crate::CloneOutcome) instead.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Missing credentials or malformed criteria, raised before any network call.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network failure that outlived the retry budget.
    #[error("network error: {0}")]
    Network(String),

    /// The host rejected the request (authentication, malformed query, ...).
    #[error("host rejected request (HTTP {status}): {message}")]
    Host { status: u16, message: String },

    /// The host kept signalling a rate limit past the configured wait budget.
    #[error("rate limit persisted after {waits} waits")]
    RateLimitExhausted { waits: u32 },

    /// Host response could not be decoded.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad identifier, out-of-range value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Report serialization error.
    #[error("export error: {0}")]
    Export(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, HarvestError>;

impl HarvestError {
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
        let err = HarvestError::config("missing GitHub token");
        assert_eq!(err.to_string(), "config error: missing GitHub token");

        let err = HarvestError::Host {
            status: 401,
            message: "Bad credentials".into(),
        };
        assert_eq!(
            err.to_string(),
            "host rejected request (HTTP 401): Bad credentials"
        );

        let err = HarvestError::RateLimitExhausted { waits: 5 };
        assert!(err.to_string().contains("5 waits"));
    }
}
