use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use stowage_core::{PackageError, PackageKey, PackageResult};
use tracing::info;

/// Format version written by this build.
pub const STATE_FORMAT_VERSION: u32 = 1;
/// Older files are discarded and trigger a full rescan.
pub const MIN_SUPPORTED_STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    Active,
    Inactive,
}

impl ActivationState {
    pub fn is_active(self) -> bool {
        self == Self::Active
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageStateEntry {
    pub package_path: String,
    pub state: ActivationState,
    #[serde(default, skip_serializing_if = "is_false")]
    pub frozen: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frozen_fingerprint: Option<String>,
}

/// Durable record of which packages exist and how they are activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryState {
    pub version: u32,
    #[serde(default)]
    pub packages: BTreeMap<PackageKey, PackageStateEntry>,
}

impl Default for RegistryState {
    fn default() -> Self {
        Self {
            version: STATE_FORMAT_VERSION,
            packages: BTreeMap::new(),
        }
    }
}

impl RegistryState {
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Case-insensitive lookup of a package entry.
    pub fn entry(&self, key: &str) -> Option<(&PackageKey, &PackageStateEntry)> {
        self.packages
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_case(key))
    }
}

pub(crate) fn parse_state_file(content: &str, path: &Path) -> PackageResult<RegistryState> {
    let corrupt = |reason: String| PackageError::CorruptStateFile {
        path: path.to_path_buf(),
        reason,
    };

    if content.trim().is_empty() {
        return Ok(RegistryState::default());
    }

    let value: Value = serde_json::from_str(content).map_err(|err| corrupt(err.to_string()))?;
    if !value.is_object() {
        return Err(corrupt("top-level value must be an object".to_string()));
    }

    let version = match value.get("version") {
        None => {
            info!(state_file = %path.display(), "package states carry no version, discarding");
            return Ok(RegistryState::default());
        }
        Some(version) => version
            .as_u64()
            .ok_or_else(|| corrupt("version must be a non-negative integer".to_string()))?,
    };
    if version < u64::from(MIN_SUPPORTED_STATE_VERSION) {
        info!(
            state_file = %path.display(),
            version,
            minimum = MIN_SUPPORTED_STATE_VERSION,
            "package states use an outdated format, discarding"
        );
        return Ok(RegistryState::default());
    }
    if version > u64::from(STATE_FORMAT_VERSION) {
        return Err(corrupt(format!(
            "unsupported state version {version} (expected at most {STATE_FORMAT_VERSION})"
        )));
    }

    let mut state: RegistryState =
        serde_json::from_value(value).map_err(|err| corrupt(err.to_string()))?;
    state.version = STATE_FORMAT_VERSION;
    Ok(state)
}

fn is_false(value: &bool) -> bool {
    !*value
}
