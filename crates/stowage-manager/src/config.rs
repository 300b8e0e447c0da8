use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use stowage_core::{PackageKey, RuntimeMode};
use stowage_registry::{PathScanner, DEFAULT_MAX_SCAN_DEPTH};

pub const CONFIG_FILE_NAME: &str = "stowage.toml";
pub const CONTEXT_ENV_VAR: &str = "STOWAGE_CONTEXT";

/// Workspace settings read from `stowage.toml`. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ManagerConfig {
    pub packages_dir: PathBuf,
    /// Directories below `packages_dir` that are scanned, in order.
    pub groups: Vec<String>,
    /// Group new packages are created in unless their type maps elsewhere.
    pub default_group: String,
    pub state_file: PathBuf,
    pub cache_dir: PathBuf,
    pub context: RuntimeMode,
    pub protected: Vec<PackageKey>,
    pub inactive_by_default: Vec<PackageKey>,
    pub exclude_patterns: Vec<String>,
    pub max_scan_depth: usize,
    pub strict_validation: bool,
    /// Package type to directory below `packages_dir`. These directories
    /// are scanned as well.
    pub paths_by_type: BTreeMap<String, String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            packages_dir: PathBuf::from("packages"),
            groups: vec![
                "framework".to_string(),
                "application".to_string(),
                "libraries".to_string(),
            ],
            default_group: "application".to_string(),
            state_file: PathBuf::from(".stowage/PackageStates.json"),
            cache_dir: PathBuf::from(".stowage/cache"),
            context: RuntimeMode::Development,
            protected: Vec::new(),
            inactive_by_default: Vec::new(),
            exclude_patterns: vec!["(^|/)node_modules$".to_string()],
            max_scan_depth: DEFAULT_MAX_SCAN_DEPTH,
            strict_validation: false,
            paths_by_type: BTreeMap::new(),
        }
    }
}

impl ManagerConfig {
    /// Reads `stowage.toml` below `root`, falling back to defaults when the
    /// file does not exist, and applies `STOWAGE_CONTEXT`.
    pub fn load(root: &Path) -> Result<Self> {
        let mut config = Self::load_file(&root.join(CONFIG_FILE_NAME))?;
        if let Ok(context) = std::env::var(CONTEXT_ENV_VAR) {
            config
                .apply_context_override(&context)
                .with_context(|| format!("invalid {CONTEXT_ENV_VAR} value"))?;
        }
        Ok(config)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed parsing config: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_context_override(&mut self, value: &str) -> Result<()> {
        self.context = value.parse::<RuntimeMode>().map_err(|err| anyhow!(err))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            bail!("at least one package group must be configured");
        }
        for group in self.groups.iter().chain(self.paths_by_type.values()) {
            validate_relative_dir(group)?;
        }
        self.validate_disjoint_base_dirs()?;
        self.validate_cache_dir()?;
        if !self.groups.contains(&self.default_group) {
            bail!(
                "default group '{}' is not one of the configured groups",
                self.default_group
            );
        }
        if self.max_scan_depth == 0 {
            bail!("max-scan-depth must be greater than zero");
        }
        Ok(())
    }

    /// Base directories are scanned independently, so none may sit inside
    /// another. Repeating the same directory is fine.
    fn validate_disjoint_base_dirs(&self) -> Result<()> {
        let dirs = self
            .groups
            .iter()
            .chain(self.paths_by_type.values())
            .map(|dir| (dir, normalized(Path::new(dir))))
            .collect::<Vec<_>>();
        for (outer, outer_path) in &dirs {
            for (inner, inner_path) in &dirs {
                if inner_path != outer_path && inner_path.starts_with(outer_path) {
                    bail!("package directory '{inner}' must not be nested inside '{outer}'");
                }
            }
        }
        Ok(())
    }

    /// The cache directory is emptied after every change and must not hold
    /// the state file or any packages.
    fn validate_cache_dir(&self) -> Result<()> {
        let cache_dir = normalized(&self.cache_dir);
        let state_dir = normalized(self.state_file.parent().unwrap_or_else(|| Path::new("")));
        let packages_dir = normalized(&self.packages_dir);
        if state_dir.starts_with(&cache_dir) {
            bail!(
                "cache-dir '{}' must not contain the state file '{}'",
                self.cache_dir.display(),
                self.state_file.display()
            );
        }
        if packages_dir.starts_with(&cache_dir) {
            bail!(
                "cache-dir '{}' must not contain packages-dir '{}'",
                self.cache_dir.display(),
                self.packages_dir.display()
            );
        }
        Ok(())
    }

    /// Scanner configured with this workspace's excludes and limits.
    pub fn scanner(&self) -> Result<PathScanner> {
        let excludes = self
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern)
                    .with_context(|| format!("invalid exclude pattern '{pattern}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PathScanner::new()
            .with_max_depth(self.max_scan_depth)
            .with_excludes(excludes)
            .with_strict_manifests(self.strict_validation))
    }
}

/// Drops `.` components so `./packages` and `packages` compare equal.
fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, std::path::Component::CurDir))
        .collect()
}

fn validate_relative_dir(value: &str) -> Result<()> {
    let path = Path::new(value);
    if value.trim().is_empty() || path.is_absolute() {
        bail!("package directory '{value}' must be a non-empty relative path");
    }
    if path
        .components()
        .any(|component| matches!(component, std::path::Component::ParentDir))
    {
        bail!("package directory '{value}' must not contain '..'");
    }
    Ok(())
}
