use std::fs;
use std::io;
use std::path::Path;

use semver::Version;
use stowage_core::{
    PackageError, PackageKey, PackageManifest, PackageResult, DEFAULT_PACKAGE_TYPE,
    MANIFEST_FILE_NAME, SKELETON_DIRECTORIES,
};

/// Settings for a newly created package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Defaults to `library`.
    pub package_type: Option<String>,
    pub description: Option<String>,
    pub version: Option<Version>,
    pub dependencies: Vec<PackageKey>,
}

impl CreateOptions {
    pub fn package_type(&self) -> &str {
        self.package_type.as_deref().unwrap_or(DEFAULT_PACKAGE_TYPE)
    }

    pub(crate) fn manifest_for(&self, key: &PackageKey) -> PackageManifest {
        PackageManifest {
            key: Some(key.clone()),
            name: Some(key.distribution_name()),
            package_type: self.package_type().to_string(),
            description: self.description.clone(),
            version: self.version.clone(),
            dependencies: self.dependencies.clone(),
            entry_point: None,
        }
    }
}

/// Creates the directory skeleton and manifest of a new package.
pub(crate) fn write_skeleton(package_dir: &Path, manifest: &PackageManifest) -> PackageResult<()> {
    if package_dir.exists() {
        return Err(PackageError::invalid_path(
            package_dir,
            "package directory already exists",
        ));
    }

    for relative in SKELETON_DIRECTORIES {
        let dir = package_dir.join(relative);
        fs::create_dir_all(&dir)
            .map_err(|err| PackageError::io("failed creating package directory", &dir, err))?;
    }

    let manifest_path = package_dir.join(MANIFEST_FILE_NAME);
    let content = manifest.to_toml_string().map_err(|err| {
        PackageError::io(
            "failed serializing package manifest",
            &manifest_path,
            io::Error::other(err),
        )
    })?;
    fs::write(&manifest_path, content)
        .map_err(|err| PackageError::io("failed writing package manifest", &manifest_path, err))
}
