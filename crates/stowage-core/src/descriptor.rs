use std::fs;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::{PackageError, PackageKey, PackageManifest, PackageResult, MANIFEST_FILE_NAME};

pub const DIRECTORY_CLASSES: &str = "classes";
pub const DIRECTORY_CONFIGURATION: &str = "configuration";
pub const DIRECTORY_RESOURCES: &str = "resources";
pub const DIRECTORY_DOCUMENTATION: &str = "documentation";
pub const DIRECTORY_METADATA: &str = "metadata";
pub const DIRECTORY_TESTS_UNIT: &str = "tests/unit";
pub const DIRECTORY_TESTS_FUNCTIONAL: &str = "tests/functional";

/// Directories written for every newly created package.
pub const SKELETON_DIRECTORIES: [&str; 7] = [
    DIRECTORY_METADATA,
    DIRECTORY_CLASSES,
    DIRECTORY_CONFIGURATION,
    DIRECTORY_DOCUMENTATION,
    DIRECTORY_RESOURCES,
    DIRECTORY_TESTS_UNIT,
    DIRECTORY_TESTS_FUNCTIONAL,
];

/// One package known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    key: PackageKey,
    root: PathBuf,
    protected: bool,
    manifest: PackageManifest,
}

impl PackageDescriptor {
    /// The root must be an absolute path to an existing directory.
    pub fn new(
        key: PackageKey,
        root: impl Into<PathBuf>,
        protected: bool,
        manifest: PackageManifest,
    ) -> PackageResult<Self> {
        let root = root.into();
        if !root.is_absolute() {
            return Err(PackageError::invalid_path(root, "package path must be absolute"));
        }
        match fs::metadata(&root) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(PackageError::invalid_path(root, "package path is not a directory"));
            }
            Err(_) => {
                return Err(PackageError::invalid_path(root, "package path does not exist"));
            }
        }

        Ok(Self {
            key,
            root,
            protected,
            manifest,
        })
    }

    pub fn key(&self) -> &PackageKey {
        &self.key
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root path rendered with a trailing separator, as persisted.
    pub fn root_path_string(&self) -> String {
        with_trailing_separator(&self.root)
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    pub fn package_type(&self) -> &str {
        &self.manifest.package_type
    }

    pub fn dependencies(&self) -> &[PackageKey] {
        &self.manifest.dependencies
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE_NAME)
    }

    pub fn classes_path(&self) -> PathBuf {
        self.root.join(DIRECTORY_CLASSES)
    }

    pub fn configuration_path(&self) -> PathBuf {
        self.root.join(DIRECTORY_CONFIGURATION)
    }

    pub fn resources_path(&self) -> PathBuf {
        self.root.join(DIRECTORY_RESOURCES)
    }

    pub fn documentation_path(&self) -> PathBuf {
        self.root.join(DIRECTORY_DOCUMENTATION)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.root.join(DIRECTORY_METADATA)
    }

    pub fn unit_tests_path(&self) -> PathBuf {
        self.root.join(DIRECTORY_TESTS_UNIT)
    }

    pub fn functional_tests_path(&self) -> PathBuf {
        self.root.join(DIRECTORY_TESTS_FUNCTIONAL)
    }

    /// Checks the on-disk structure the descriptor relies on.
    pub fn verify_structure(&self) -> PackageResult<()> {
        let corrupt = |reason: String| PackageError::CorruptPackage {
            key: self.key.to_string(),
            reason,
        };

        if !self.root.is_dir() {
            return Err(corrupt(format!(
                "package directory {} is missing",
                self.root.display()
            )));
        }
        if !self.classes_path().is_dir() {
            return Err(corrupt(format!(
                "classes directory {} is missing",
                self.classes_path().display()
            )));
        }
        if let Some(entry_point) = &self.manifest.entry_point {
            let entry_point_path = self.root.join(entry_point);
            if !entry_point_path.is_file() {
                return Err(corrupt(format!(
                    "entry point {} is missing",
                    entry_point_path.display()
                )));
            }
        }

        Ok(())
    }
}

pub fn with_trailing_separator(path: &Path) -> String {
    let mut rendered = path.display().to_string();
    if !rendered.ends_with(MAIN_SEPARATOR) && !rendered.ends_with('/') {
        rendered.push(MAIN_SEPARATOR);
    }
    rendered
}

/// Parses a persisted package path, which must be absolute and carry a
/// trailing separator.
pub fn parse_persisted_root(value: &str) -> PackageResult<PathBuf> {
    if !value.ends_with(MAIN_SEPARATOR) && !value.ends_with('/') {
        return Err(PackageError::invalid_path(
            value,
            "package path must end with a path separator",
        ));
    }
    let path = PathBuf::from(value);
    if !path.is_absolute() {
        return Err(PackageError::invalid_path(path, "package path must be absolute"));
    }
    Ok(path)
}
