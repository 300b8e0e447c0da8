use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use stowage_core::{PackageError, PackageResult};
use tracing::debug;

use crate::fs_ops::write_text_atomic;
use crate::state::{parse_state_file, RegistryState, STATE_FORMAT_VERSION};

/// Single writer of the package state file.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means no state; outdated files are treated as empty.
    pub fn load(&self) -> PackageResult<RegistryState> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(state_file = %self.path.display(), "no package states found");
                return Ok(RegistryState::default());
            }
            Err(err) => {
                return Err(PackageError::io(
                    "failed reading package states",
                    &self.path,
                    err,
                ));
            }
        };

        let content = String::from_utf8(bytes).map_err(|_| PackageError::CorruptStateFile {
            path: self.path.clone(),
            reason: "file is not valid UTF-8".to_string(),
        })?;
        parse_state_file(&content, &self.path)
    }

    pub fn save(&self, state: &RegistryState) -> PackageResult<()> {
        let mut state = state.clone();
        state.version = STATE_FORMAT_VERSION;

        let mut content = serde_json::to_string_pretty(&state).map_err(|err| {
            PackageError::io(
                "failed serializing package states",
                &self.path,
                io::Error::other(err),
            )
        })?;
        content.push('\n');
        write_text_atomic(&self.path, &content)?;
        debug!(
            state_file = %self.path.display(),
            packages = state.packages.len(),
            "saved package states"
        );
        Ok(())
    }
}
