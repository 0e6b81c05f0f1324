//! CSW-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SweepError>;

/// Top-level error type for the cache sweeper.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("[CSW-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[CSW-1002] invalid rule {name:?}: {details}")]
    InvalidRule { name: String, details: String },

    #[error("[CSW-1003] invalid schedule entry {name:?}: {details}")]
    InvalidSchedule { name: String, details: String },

    #[error("[CSW-1004] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[CSW-2001] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[CSW-2002] {operation} is still running")]
    Busy { operation: &'static str },

    #[error("[CSW-2003] nothing to clean: run a scan first")]
    NothingToClean,

    #[error("[CSW-3001] permission denied for {path}")]
    PermissionDenied { path: PathBuf },

    #[error("[CSW-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[CSW-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[CSW-3004] recycle bin failure for {path}: {details}")]
    Recycle { path: PathBuf, details: String },

    #[error("[CSW-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl SweepError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "CSW-1001",
            Self::InvalidRule { .. } => "CSW-1002",
            Self::InvalidSchedule { .. } => "CSW-1003",
            Self::ConfigParse { .. } => "CSW-1004",
            Self::Serialization { .. } => "CSW-2001",
            Self::Busy { .. } => "CSW-2002",
            Self::NothingToClean => "CSW-2003",
            Self::PermissionDenied { .. } => "CSW-3001",
            Self::Io { .. } => "CSW-3002",
            Self::ChannelClosed { .. } => "CSW-3003",
            Self::Recycle { .. } => "CSW-3004",
            Self::Runtime { .. } => "CSW-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::Busy { .. }
                | Self::ChannelClosed { .. }
                | Self::Recycle { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    ///
    /// Permission errors are promoted to [`SweepError::PermissionDenied`] so
    /// per-file failure records carry the more specific code.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied {
                path: path.as_ref().to_path_buf(),
            };
        }
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for SweepError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}
