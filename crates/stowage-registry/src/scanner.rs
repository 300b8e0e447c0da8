use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use stowage_core::{PackageError, PackageKey, PackageManifest, PackageResult, MANIFEST_FILE_NAME};
use tracing::{debug, warn};

pub const DEFAULT_MAX_SCAN_DEPTH: usize = 100;

/// A package root found on disk, before it becomes a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPackage {
    pub key: PackageKey,
    pub path: PathBuf,
    pub base_dir: PathBuf,
    pub manifest: PackageManifest,
}

/// Walks base directories looking for `package.toml` markers.
#[derive(Debug, Clone)]
pub struct PathScanner {
    max_depth: usize,
    excludes: Vec<Regex>,
    strict_manifests: bool,
}

impl Default for PathScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PathScanner {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_SCAN_DEPTH,
            excludes: Vec::new(),
            strict_manifests: false,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Patterns are matched against the `/`-joined path relative to the
    /// base directory; matching directories are not entered.
    pub fn with_excludes(mut self, excludes: Vec<Regex>) -> Self {
        self.excludes = excludes;
        self
    }

    /// Unparseable manifests abort the scan instead of being skipped.
    pub fn with_strict_manifests(mut self, strict: bool) -> Self {
        self.strict_manifests = strict;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn scan(&self, base_dirs: &[PathBuf]) -> PackageResult<Vec<DiscoveredPackage>> {
        let mut found: BTreeMap<String, DiscoveredPackage> = BTreeMap::new();

        for base_dir in base_dirs {
            let base_root = fs::canonicalize(base_dir).map_err(|_| {
                PackageError::invalid_path(base_dir, "package base directory does not exist")
            })?;
            if !base_root.is_dir() {
                return Err(PackageError::invalid_path(
                    base_dir,
                    "package base directory is not a directory",
                ));
            }
            debug!(base_dir = %base_root.display(), "scanning for packages");
            self.scan_base(&base_root, &mut found)?;
        }

        Ok(found.into_values().collect())
    }

    fn scan_base(
        &self,
        base_root: &Path,
        found: &mut BTreeMap<String, DiscoveredPackage>,
    ) -> PackageResult<()> {
        let mut pending: Vec<(PathBuf, usize)> = vec![(base_root.to_path_buf(), 0)];

        while let Some((dir, depth)) = pending.pop() {
            // Reverse so that popping visits entries in name order.
            for entry_path in read_sorted_subdirectories(&dir)?.into_iter().rev() {
                let relative = relative_path_string(base_root, &entry_path);
                if self.is_excluded(&relative) {
                    debug!(path = %entry_path.display(), "directory excluded from package scan");
                    continue;
                }

                let child_depth = depth + 1;
                if child_depth > self.max_depth {
                    return Err(PackageError::ScanDepthExceeded {
                        path: entry_path,
                        max_depth: self.max_depth,
                    });
                }

                let manifest_path = entry_path.join(MANIFEST_FILE_NAME);
                if !manifest_path.is_file() {
                    pending.push((entry_path, child_depth));
                    continue;
                }

                let Some(manifest) = self.read_manifest(&manifest_path, &relative)? else {
                    continue;
                };
                if manifest.is_collection() {
                    pending.push((entry_path, child_depth));
                    continue;
                }

                let key = match derive_package_key(&manifest, &relative) {
                    Ok(key) => key,
                    Err(err) => {
                        warn!(path = %entry_path.display(), error = %err, "skipping package with invalid key");
                        continue;
                    }
                };

                let path = fs::canonicalize(&entry_path).map_err(|err| {
                    PackageError::io("failed resolving package path", &entry_path, err)
                })?;
                let lookup = key.lookup_form();
                if let Some(existing) = found.get(&lookup) {
                    return Err(PackageError::DuplicatePackage {
                        key: key.to_string(),
                        first: existing.path.clone(),
                        second: path,
                    });
                }

                debug!(package = %key, path = %path.display(), "discovered package");
                found.insert(
                    lookup,
                    DiscoveredPackage {
                        key,
                        path,
                        base_dir: base_root.to_path_buf(),
                        manifest,
                    },
                );
            }
        }

        Ok(())
    }

    fn is_excluded(&self, relative: &str) -> bool {
        self.excludes.iter().any(|pattern| pattern.is_match(relative))
    }

    fn read_manifest(
        &self,
        manifest_path: &Path,
        relative: &str,
    ) -> PackageResult<Option<PackageManifest>> {
        let content = fs::read_to_string(manifest_path)
            .map_err(|err| PackageError::io("failed reading package manifest", manifest_path, err))?;
        match PackageManifest::from_toml_str(&content) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(err) if self.strict_manifests => Err(PackageError::CorruptPackage {
                key: relative.to_string(),
                reason: err.to_string(),
            }),
            Err(err) => {
                warn!(manifest = %manifest_path.display(), error = %err, "skipping package with unreadable manifest");
                Ok(None)
            }
        }
    }
}

fn derive_package_key(manifest: &PackageManifest, relative: &str) -> PackageResult<PackageKey> {
    match &manifest.key {
        Some(key) => Ok(key.clone()),
        None => PackageKey::from_segments(relative.split('/')),
    }
}

fn read_sorted_subdirectories(dir: &Path) -> PackageResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|err| PackageError::io("failed reading package directory", dir, err))?;

    let mut subdirectories = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|err| PackageError::io("failed reading package directory", dir, err))?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        // `is_dir` follows symlinks; the depth bound guards against cycles.
        if path.is_dir() {
            subdirectories.push(path);
        }
    }
    subdirectories.sort();
    Ok(subdirectories)
}

fn relative_path_string(base_root: &Path, path: &Path) -> String {
    path.strip_prefix(base_root)
        .unwrap_or(path)
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

