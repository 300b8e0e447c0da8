use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for package registry operations.
pub type PackageResult<T> = Result<T, PackageError>;

/// Errors raised while discovering, persisting or mutating packages.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("invalid package key '{key}': {reason}")]
    InvalidPackageKey { key: String, reason: String },

    #[error("invalid package path {}: {reason}", path.display())]
    InvalidPackagePath { path: PathBuf, reason: String },

    #[error("package '{key}' is not available")]
    UnknownPackage { key: String },

    #[error(
        "package '{key}' was found more than once: remove either {} or {}",
        first.display(),
        second.display()
    )]
    DuplicatePackage {
        key: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("package '{key}' is protected and cannot be {action}")]
    ProtectedPackage { key: String, action: &'static str },

    #[error("package '{key}' {reason}")]
    InvalidPackageState { key: String, reason: String },

    #[error("package '{key}' is corrupt: {reason}")]
    CorruptPackage { key: String, reason: String },

    #[error("package state file {} is corrupt: {reason}", path.display())]
    CorruptStateFile { path: PathBuf, reason: String },

    #[error("package scan exceeded the maximum depth of {max_depth} at {}", path.display())]
    ScanDepthExceeded { path: PathBuf, max_depth: usize },

    #[error("{operation} is only supported in development context (current: {mode})")]
    UnsupportedRuntimeMode {
        operation: &'static str,
        mode: String,
    },

    #[error("{context}: {}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PackageError {
    pub fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }

    pub fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPackagePath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown(key: impl Into<String>) -> Self {
        Self::UnknownPackage { key: key.into() }
    }
}
