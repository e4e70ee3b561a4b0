//! Error types shared across Reelsmith crates.
//!
//! Every failure surfaced to a caller maps onto a stable [`ErrorKind`].
//! Non-fatal failures (a skipped caption, a music fallback) are not
//! returned as errors at all; they are recorded as [`Diagnostic`]s.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for Reelsmith operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelsmithError {
    #[error("Resource not found: {path}")]
    ResourceNotFound { path: PathBuf },

    #[error("Unsupported format ({path}): {message}")]
    UnsupportedFormat { path: PathBuf, message: String },

    #[error("Overlay construction failed for caption {index}: {message}")]
    OverlayConstructionFailed { index: usize, message: String },

    #[error("Audio mix failed: {message}")]
    MixFailed { message: String },

    #[error("Encode failed: {message}")]
    EncodeFailed { message: String },

    #[error("Invalid options: {message}")]
    InvalidOptions { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using ReelsmithError.
pub type ReelsmithResult<T> = Result<T, ReelsmithError>;

/// Stable, machine-readable classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ResourceNotFound,
    UnsupportedFormat,
    OverlayConstructionFailed,
    MixFailed,
    EncodeFailed,
    InvalidOptions,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResourceNotFound => "resource_not_found",
            Self::UnsupportedFormat => "unsupported_format",
            Self::OverlayConstructionFailed => "overlay_construction_failed",
            Self::MixFailed => "mix_failed",
            Self::EncodeFailed => "encode_failed",
            Self::InvalidOptions => "invalid_options",
            Self::Internal => "internal",
        }
    }

    /// Whether a failure of this kind aborts a render.
    pub fn is_fatal(self) -> bool {
        !matches!(self, Self::OverlayConstructionFailed | Self::MixFailed)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ReelsmithError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::ResourceNotFound { path: path.into() }
    }

    pub fn unsupported_format(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn overlay(index: usize, msg: impl Into<String>) -> Self {
        Self::OverlayConstructionFailed {
            index,
            message: msg.into(),
        }
    }

    pub fn mix_failed(msg: impl Into<String>) -> Self {
        Self::MixFailed {
            message: msg.into(),
        }
    }

    pub fn encode_failed(msg: impl Into<String>) -> Self {
        Self::EncodeFailed {
            message: msg.into(),
        }
    }

    pub fn invalid_options(msg: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// The stable kind reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::OverlayConstructionFailed { .. } => ErrorKind::OverlayConstructionFailed,
            Self::MixFailed { .. } => ErrorKind::MixFailed,
            Self::EncodeFailed { .. } | Self::Unsupported { .. } => ErrorKind::EncodeFailed,
            Self::InvalidOptions { .. } => ErrorKind::InvalidOptions,
            Self::Config { .. } | Self::Io(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }
}

/// Caller-visible failure: a stable kind plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&ReelsmithError> for FailureReport {
    fn from(err: &ReelsmithError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<ReelsmithError> for FailureReport {
    fn from(err: ReelsmithError) -> Self {
        Self::from(&err)
    }
}

/// A swallowed, non-fatal failure recorded during a render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&ReelsmithError> for Diagnostic {
    fn from(err: &ReelsmithError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            ReelsmithError::not_found("/tmp/missing.mp4").kind(),
            ErrorKind::ResourceNotFound
        );
        assert_eq!(
            ReelsmithError::unsupported("ffmpeg missing").kind(),
            ErrorKind::EncodeFailed
        );
        let io = ReelsmithError::from(std::io::Error::other("disk"));
        assert_eq!(io.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_non_fatal_kinds() {
        assert!(!ErrorKind::OverlayConstructionFailed.is_fatal());
        assert!(!ErrorKind::MixFailed.is_fatal());
        assert!(ErrorKind::EncodeFailed.is_fatal());
        assert!(ErrorKind::ResourceNotFound.is_fatal());
    }

    #[test]
    fn test_failure_report_serializes_snake_case_kind() {
        let report = FailureReport::from(ReelsmithError::invalid_options("bad orientation"));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "invalid_options");
        assert_eq!(json["message"], "Invalid options: bad orientation");
    }
}
