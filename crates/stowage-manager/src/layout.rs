use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::ManagerConfig;

/// Resolved on-disk locations of one workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: PathBuf,
    packages_dir: PathBuf,
    state_file: PathBuf,
    cache_dir: PathBuf,
    base_dirs: Vec<PathBuf>,
}

impl WorkspaceLayout {
    pub fn new(root: impl Into<PathBuf>, config: &ManagerConfig) -> Self {
        let root = root.into();
        let packages_dir = resolve(&root, &config.packages_dir);
        let mut base_dirs: Vec<PathBuf> = Vec::new();
        for dir in config.groups.iter().chain(config.paths_by_type.values()) {
            let dir = packages_dir.join(dir);
            if !base_dirs.contains(&dir) {
                base_dirs.push(dir);
            }
        }

        Self {
            state_file: resolve(&root, &config.state_file),
            cache_dir: resolve(&root, &config.cache_dir),
            packages_dir,
            base_dirs,
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    pub fn group_dir(&self, group: &str) -> PathBuf {
        self.packages_dir.join(group)
    }

    /// Directories scanned for packages.
    pub fn base_dirs(&self) -> &[PathBuf] {
        &self.base_dirs
    }

    pub fn state_file_path(&self) -> &Path {
        &self.state_file
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in self.base_dirs.iter().chain([&self.cache_dir]) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        Ok(())
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
