use std::collections::HashSet;

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PackageKey;

pub const MANIFEST_FILE_NAME: &str = "package.toml";
pub const DEFAULT_PACKAGE_TYPE: &str = "library";
/// Packages of this type only group other packages and are walked through
/// during a scan.
pub const COLLECTION_PACKAGE_TYPE: &str = "collection";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to parse package manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize package manifest: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("package manifest lists dependency '{0}' more than once")]
    DuplicateDependency(String),
    #[error("package manifest for '{0}' depends on itself")]
    SelfDependency(String),
}

/// Contents of a package's `package.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PackageKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default = "default_package_type")]
    pub package_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<PackageKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
}

impl Default for PackageManifest {
    fn default() -> Self {
        Self {
            key: None,
            name: None,
            package_type: default_package_type(),
            description: None,
            version: None,
            dependencies: Vec::new(),
            entry_point: None,
        }
    }
}

impl PackageManifest {
    pub fn from_toml_str(input: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(input)?;

        let mut seen = HashSet::with_capacity(manifest.dependencies.len());
        for dependency in &manifest.dependencies {
            if !seen.insert(dependency.lookup_form()) {
                return Err(ManifestError::DuplicateDependency(dependency.to_string()));
            }
            if let Some(key) = &manifest.key {
                if key.eq_ignore_case(dependency.as_str()) {
                    return Err(ManifestError::SelfDependency(key.to_string()));
                }
            }
        }

        Ok(manifest)
    }

    pub fn to_toml_string(&self) -> Result<String, ManifestError> {
        Ok(toml::to_string(self)?)
    }

    pub fn is_collection(&self) -> bool {
        self.package_type == COLLECTION_PACKAGE_TYPE
    }
}

fn default_package_type() -> String {
    DEFAULT_PACKAGE_TYPE.to_string()
}
