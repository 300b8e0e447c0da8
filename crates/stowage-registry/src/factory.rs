use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use stowage_core::{
    PackageDescriptor, PackageError, PackageKey, PackageManifest, PackageResult,
    MANIFEST_FILE_NAME,
};

use crate::DiscoveredPackage;

/// Turns discovered or persisted package data into descriptors.
#[derive(Debug, Clone, Default)]
pub struct DescriptorFactory {
    protected: BTreeSet<String>,
}

impl DescriptorFactory {
    pub fn new<I>(protected: I) -> Self
    where
        I: IntoIterator<Item = PackageKey>,
    {
        Self {
            protected: protected.into_iter().map(|key| key.lookup_form()).collect(),
        }
    }

    pub fn is_protected(&self, key: &PackageKey) -> bool {
        self.protected.contains(&key.lookup_form())
    }

    pub fn create(
        &self,
        key: PackageKey,
        root: &Path,
        manifest: PackageManifest,
    ) -> PackageResult<PackageDescriptor> {
        let protected = self.is_protected(&key);
        PackageDescriptor::new(key, root, protected, manifest)
    }

    pub fn from_discovered(&self, package: DiscoveredPackage) -> PackageResult<PackageDescriptor> {
        self.create(package.key, &package.path, package.manifest)
    }

    /// Reads the manifest below `root` and builds the descriptor for `key`.
    pub fn load(&self, key: PackageKey, root: &Path) -> PackageResult<PackageDescriptor> {
        let manifest_path = root.join(MANIFEST_FILE_NAME);
        let content = match fs::read_to_string(&manifest_path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PackageError::invalid_path(
                    root,
                    format!("no {MANIFEST_FILE_NAME} found"),
                ));
            }
            Err(err) => {
                return Err(PackageError::io(
                    "failed reading package manifest",
                    manifest_path,
                    err,
                ));
            }
        };

        let manifest =
            PackageManifest::from_toml_str(&content).map_err(|err| PackageError::CorruptPackage {
                key: key.to_string(),
                reason: err.to_string(),
            })?;
        if let Some(declared) = &manifest.key {
            if !declared.eq_ignore_case(key.as_str()) {
                return Err(PackageError::CorruptPackage {
                    key: key.to_string(),
                    reason: format!("manifest declares key '{declared}'"),
                });
            }
        }

        self.create(key, root, manifest)
    }
}
