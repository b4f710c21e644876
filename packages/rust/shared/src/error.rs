//! Error types for LessonForge.
//!
//! Library crates use [`LessonForgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for all LessonForge operations.
#[derive(Debug, thiserror::Error)]
pub enum LessonForgeError {
    /// A document or collection key does not resolve to anything on disk.
    #[error("not found: {key}")]
    NotFound { key: String },

    /// A legacy document has no recoverable content region.
    #[error("extraction failed: {message}")]
    Extraction { message: String },

    /// A target template lacks an anchor the transplant needs.
    #[error("transplant failed: {message}")]
    Transplant { message: String },

    /// An anchor expected exactly once appears several times.
    #[error("configuration error: anchor `{anchor}` appears {count} times, expected one")]
    AmbiguousAnchor { anchor: String, count: usize },

    /// Invalid settings or rule definitions.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, LessonForgeError>;

/// Coarse failure classification recorded in batch reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Extraction,
    Transplant,
    Configuration,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::Extraction => "extraction",
            Self::Transplant => "transplant",
            Self::Configuration => "configuration",
            Self::Io => "io",
        };
        f.write_str(s)
    }
}

impl LessonForgeError {
    /// Create a not-found error for any displayable key.
    pub fn not_found(key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Create a transplant error from any displayable message.
    pub fn transplant(msg: impl Into<String>) -> Self {
        Self::Transplant {
            message: msg.into(),
        }
    }

    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Report an anchor that matched `count` times.
    pub fn ambiguous_anchor(anchor: impl Into<String>, count: usize) -> Self {
        Self::AmbiguousAnchor {
            anchor: anchor.into(),
            count,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify this error for the batch report.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::Transplant { .. } => ErrorKind::Transplant,
            Self::AmbiguousAnchor { .. } | Self::Config { .. } => ErrorKind::Configuration,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}
