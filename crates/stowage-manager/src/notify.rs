use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stowage_core::PackageKey;
use tracing::debug;

/// A committed change to the package states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageChange {
    Created(PackageKey),
    Activated(PackageKey),
    Deactivated(PackageKey),
    Frozen(PackageKey),
    Unfrozen(PackageKey),
    Refrozen(PackageKey),
    Deleted(PackageKey),
    Rescanned,
}

impl PackageChange {
    pub fn key(&self) -> Option<&PackageKey> {
        match self {
            Self::Created(key)
            | Self::Activated(key)
            | Self::Deactivated(key)
            | Self::Frozen(key)
            | Self::Unfrozen(key)
            | Self::Refrozen(key)
            | Self::Deleted(key) => Some(key),
            Self::Rescanned => None,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Activated(_) => "activated",
            Self::Deactivated(_) => "deactivated",
            Self::Frozen(_) => "frozen",
            Self::Unfrozen(_) => "unfrozen",
            Self::Refrozen(_) => "refrozen",
            Self::Deleted(_) => "deleted",
            Self::Rescanned => "rescanned",
        }
    }
}

/// Receives a notification after every persisted package state change.
pub trait PackageChangeSink {
    fn packages_changed(&self, change: &PackageChange) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl PackageChangeSink for NoopSink {
    fn packages_changed(&self, _change: &PackageChange) -> Result<()> {
        Ok(())
    }
}

/// Flushes a cache directory whenever package states change.
#[derive(Debug, Clone)]
pub struct CacheDirectorySink {
    cache_dir: PathBuf,
}

impl CacheDirectorySink {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

impl PackageChangeSink for CacheDirectorySink {
    fn packages_changed(&self, change: &PackageChange) -> Result<()> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed reading cache directory: {}", self.cache_dir.display())
                });
            }
        };

        for entry in entries {
            let entry = entry.with_context(|| {
                format!("failed reading cache directory: {}", self.cache_dir.display())
            })?;
            let path = entry.path();
            let removed = if entry
                .file_type()
                .with_context(|| format!("failed to inspect {}", path.display()))?
                .is_dir()
            {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.with_context(|| format!("failed flushing cache entry: {}", path.display()))?;
        }

        debug!(
            cache_dir = %self.cache_dir.display(),
            action = change.action(),
            "flushed package caches"
        );
        Ok(())
    }
}
