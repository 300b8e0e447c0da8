use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use stowage_core::{
    fingerprint_directory, lookup_form, parse_persisted_root, PackageDescriptor, PackageError,
    PackageKey, PackageResult, RuntimeMode,
};
use tracing::{debug, info, warn};

use crate::fs_ops::remove_package_dir;
use crate::order::dependencies_first;
use crate::state::{ActivationState, PackageStateEntry, RegistryState};
use crate::{DescriptorFactory, DiscoveredPackage, PathScanner, StateStore};

#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Scanned in order; earlier directories win nothing, duplicates are fatal.
    pub base_dirs: Vec<PathBuf>,
    pub mode: RuntimeMode,
    pub protected: Vec<PackageKey>,
    /// Newly discovered packages listed here start inactive.
    pub inactive_by_default: Vec<PackageKey>,
    /// Verify every package's structure while initializing.
    pub strict_validation: bool,
}

/// Whether a mutation changed the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    Unchanged,
}

impl MutationOutcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackageStateFilter {
    #[default]
    Available,
    Active,
    Frozen,
}

impl FromStr for PackageStateFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "available" => Ok(Self::Available),
            "active" => Ok(Self::Active),
            "frozen" => Ok(Self::Frozen),
            _ => Err(format!("the package state '{value}' is invalid")),
        }
    }
}

/// All given criteria must match.
#[derive(Debug, Clone, Default)]
pub struct PackageFilter {
    pub state: PackageStateFilter,
    /// Name of the base directory the package lives in.
    pub group: Option<String>,
    pub package_type: Option<String>,
}

/// In-memory authority over package existence and activation.
///
/// Invariants: `frozen ⊆ active ⊆ available`, protected packages are always
/// active, and no two packages share a canonical root directory.
#[derive(Debug, Clone)]
pub struct PackageRegistry {
    options: RegistryOptions,
    factory: DescriptorFactory,
    base_roots: Vec<PathBuf>,
    available: BTreeMap<PackageKey, PackageDescriptor>,
    index: BTreeMap<String, PackageKey>,
    roots: BTreeMap<PathBuf, PackageKey>,
    active: BTreeSet<PackageKey>,
    frozen: BTreeMap<PackageKey, Option<String>>,
}

impl PackageRegistry {
    fn empty(options: RegistryOptions) -> Self {
        let factory = DescriptorFactory::new(options.protected.iter().cloned());
        let base_roots = options
            .base_dirs
            .iter()
            .filter_map(|dir| fs::canonicalize(dir).ok())
            .collect();
        Self {
            options,
            factory,
            base_roots,
            available: BTreeMap::new(),
            index: BTreeMap::new(),
            roots: BTreeMap::new(),
            active: BTreeSet::new(),
            frozen: BTreeMap::new(),
        }
    }

    /// Loads persisted state, rescans when it cannot be trusted, and saves
    /// the rebuilt state. Nothing is returned unless the whole registry
    /// could be built.
    pub fn initialize(
        store: &StateStore,
        scanner: &PathScanner,
        options: RegistryOptions,
    ) -> PackageResult<Self> {
        let loaded = store.load()?;
        let registry = if loaded.is_empty() || !options.mode.is_stable() {
            info!(
                mode = %options.mode,
                persisted = loaded.packages.len(),
                "scanning for available packages"
            );
            let discovered = scanner.scan(&options.base_dirs)?;
            Self::from_discovered(options, discovered, &loaded)?
        } else {
            Self::from_state(options, &loaded)?
        };

        if registry.options.strict_validation {
            for descriptor in registry.available.values() {
                descriptor.verify_structure()?;
            }
        }

        store.save(&registry.to_state())?;
        info!(
            available = registry.available.len(),
            active = registry.active.len(),
            frozen = registry.frozen.len(),
            "package registry loaded"
        );
        Ok(registry)
    }

    /// Rebuilds the registry from a fresh scan, keeping activation and
    /// frozen flags of packages that still exist. On error the registry is
    /// left untouched.
    pub fn rescan(&mut self, scanner: &PathScanner) -> PackageResult<()> {
        let previous = self.to_state();
        let discovered = scanner.scan(&self.options.base_dirs)?;
        let rebuilt = Self::from_discovered(self.options.clone(), discovered, &previous)?;
        *self = rebuilt;
        Ok(())
    }

    fn from_discovered(
        options: RegistryOptions,
        discovered: Vec<DiscoveredPackage>,
        previous: &RegistryState,
    ) -> PackageResult<Self> {
        let inactive_by_default: BTreeSet<String> = options
            .inactive_by_default
            .iter()
            .map(PackageKey::lookup_form)
            .collect();
        let previous_entries: BTreeMap<String, &PackageStateEntry> = previous
            .packages
            .iter()
            .map(|(key, entry)| (key.lookup_form(), entry))
            .collect();

        let mut registry = Self::empty(options);
        for package in discovered {
            let lookup = package.key.lookup_form();
            let descriptor = registry.factory.from_discovered(package)?;
            let (active, frozen) = match previous_entries.get(&lookup) {
                Some(entry) => (
                    entry.state.is_active(),
                    entry.frozen.then(|| entry.frozen_fingerprint.clone()),
                ),
                None => (!inactive_by_default.contains(&lookup), None),
            };
            registry.insert(descriptor, active, frozen)?;
        }

        for key in previous.packages.keys() {
            if !registry.index.contains_key(&key.lookup_form()) {
                info!(package = %key, "package is no longer present, removed from registry");
            }
        }

        Ok(registry)
    }

    fn from_state(options: RegistryOptions, state: &RegistryState) -> PackageResult<Self> {
        let strict = options.strict_validation;
        let mut registry = Self::empty(options);

        for (key, entry) in &state.packages {
            let root = match parse_persisted_root(&entry.package_path)
                .and_then(|root| canonical_root(&root))
            {
                Ok(root) => root,
                Err(err) => {
                    warn!(package = %key, error = %err, "pruning stale package state entry");
                    continue;
                }
            };

            let descriptor = match registry.factory.load(key.clone(), &root) {
                Ok(descriptor) => descriptor,
                Err(err @ PackageError::InvalidPackagePath { .. }) => {
                    warn!(package = %key, error = %err, "package could not be loaded, it has been unregistered");
                    continue;
                }
                Err(err @ PackageError::CorruptPackage { .. }) if !strict => {
                    warn!(package = %key, error = %err, "package could not be loaded, it has been unregistered");
                    continue;
                }
                Err(err) => return Err(err),
            };

            registry.insert(
                descriptor,
                entry.state.is_active(),
                entry.frozen.then(|| entry.frozen_fingerprint.clone()),
            )?;
        }

        Ok(registry)
    }

    fn insert(
        &mut self,
        descriptor: PackageDescriptor,
        active: bool,
        frozen: Option<Option<String>>,
    ) -> PackageResult<()> {
        let lookup = descriptor.key().lookup_form();
        if let Some(existing) = self.index.get(&lookup) {
            return Err(PackageError::DuplicatePackage {
                key: descriptor.key().to_string(),
                first: self.available[existing].root().to_path_buf(),
                second: descriptor.root().to_path_buf(),
            });
        }

        let root = canonical_root(descriptor.root())?;
        if let Some(existing) = self.roots.get(&root) {
            return Err(PackageError::DuplicatePackage {
                key: descriptor.key().to_string(),
                first: self.available[existing].root().to_path_buf(),
                second: descriptor.root().to_path_buf(),
            });
        }

        let key = descriptor.key().clone();
        let active = active || descriptor.is_protected();
        self.index.insert(lookup, key.clone());
        self.roots.insert(root, key.clone());
        if active {
            self.active.insert(key.clone());
            if let Some(fingerprint) = frozen {
                self.frozen.insert(key.clone(), fingerprint);
            }
        }
        self.available.insert(key, descriptor);
        Ok(())
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    pub fn mode(&self) -> RuntimeMode {
        self.options.mode
    }

    pub fn factory(&self) -> &DescriptorFactory {
        &self.factory
    }

    pub fn resolve_case_insensitive(&self, key: &str) -> Option<&PackageKey> {
        self.index.get(&lookup_form(key))
    }

    pub fn is_available(&self, key: &str) -> bool {
        self.resolve_case_insensitive(key).is_some()
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.resolve_case_insensitive(key)
            .is_some_and(|key| self.active.contains(key))
    }

    pub fn is_frozen(&self, key: &str) -> bool {
        self.resolve_case_insensitive(key)
            .is_some_and(|key| self.frozen.contains_key(key))
    }

    pub fn get(&self, key: &str) -> PackageResult<&PackageDescriptor> {
        let key = self.resolve_known(key)?;
        Ok(&self.available[&key])
    }

    /// Like [`get`](Self::get), but also checks the package's on-disk
    /// structure and reports a corrupt package.
    pub fn get_verified(&self, key: &str) -> PackageResult<&PackageDescriptor> {
        let descriptor = self.get(key)?;
        descriptor.verify_structure()?;
        Ok(descriptor)
    }

    /// Borrowed view; the registry cannot change while it is held.
    pub fn available(&self) -> &BTreeMap<PackageKey, PackageDescriptor> {
        &self.available
    }

    pub fn active(&self) -> Vec<&PackageDescriptor> {
        self.active.iter().map(|key| &self.available[key]).collect()
    }

    pub fn frozen(&self) -> Vec<&PackageDescriptor> {
        self.frozen.keys().map(|key| &self.available[key]).collect()
    }

    pub fn frozen_fingerprint(&self, key: &str) -> Option<&str> {
        let key = self.resolve_case_insensitive(key)?;
        self.frozen.get(key)?.as_deref()
    }

    /// Name of the base directory a package was found in.
    pub fn group_of(&self, descriptor: &PackageDescriptor) -> Option<String> {
        self.base_roots
            .iter()
            .find(|base| descriptor.root().starts_with(base))
            .and_then(|base| base.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }

    pub fn filtered(&self, filter: &PackageFilter) -> Vec<&PackageDescriptor> {
        let candidates = match filter.state {
            PackageStateFilter::Available => self.available.values().collect(),
            PackageStateFilter::Active => self.active(),
            PackageStateFilter::Frozen => self.frozen(),
        };

        candidates
            .into_iter()
            .filter(|descriptor| {
                filter
                    .group
                    .as_deref()
                    .is_none_or(|group| self.group_of(descriptor).as_deref() == Some(group))
            })
            .filter(|descriptor| {
                filter
                    .package_type
                    .as_deref()
                    .is_none_or(|package_type| descriptor.package_type() == package_type)
            })
            .collect()
    }

    /// Active packages, dependencies first.
    pub fn load_order(&self) -> Vec<&PackageKey> {
        dependencies_first(&self.active())
    }

    pub fn to_state(&self) -> RegistryState {
        let packages = self
            .available
            .iter()
            .map(|(key, descriptor)| {
                let frozen = self.frozen.get(key);
                let entry = PackageStateEntry {
                    package_path: descriptor.root_path_string(),
                    state: if self.active.contains(key) {
                        ActivationState::Active
                    } else {
                        ActivationState::Inactive
                    },
                    frozen: frozen.is_some(),
                    frozen_fingerprint: frozen.cloned().flatten(),
                };
                (key.clone(), entry)
            })
            .collect();

        RegistryState {
            packages,
            ..RegistryState::default()
        }
    }

    /// Adds a package; it starts inactive unless it is protected.
    pub fn register(&mut self, descriptor: PackageDescriptor) -> PackageResult<()> {
        debug!(package = %descriptor.key(), path = %descriptor.root().display(), "registering package");
        self.insert(descriptor, false, None)
    }

    pub fn activate(&mut self, key: &str) -> PackageResult<MutationOutcome> {
        let key = self.resolve_known(key)?;
        if !self.active.insert(key.clone()) {
            return Ok(MutationOutcome::Unchanged);
        }
        info!(package = %key, "package activated");
        Ok(MutationOutcome::Applied)
    }

    pub fn deactivate(&mut self, key: &str) -> PackageResult<MutationOutcome> {
        let key = self.resolve_known(key)?;
        if self.available[&key].is_protected() {
            return Err(PackageError::ProtectedPackage {
                key: key.to_string(),
                action: "deactivated",
            });
        }
        if !self.active.remove(&key) {
            return Err(PackageError::InvalidPackageState {
                key: key.to_string(),
                reason: "is not active".to_string(),
            });
        }
        self.frozen.remove(&key);
        info!(package = %key, "package deactivated");
        Ok(MutationOutcome::Applied)
    }

    /// Records the package's current content fingerprint.
    pub fn freeze(&mut self, key: &str) -> PackageResult<MutationOutcome> {
        self.require_freezing_mode("package freezing")?;
        let key = self.resolve_known(key)?;
        if !self.active.contains(&key) {
            return Err(PackageError::InvalidPackageState {
                key: key.to_string(),
                reason: "is not active and cannot be frozen".to_string(),
            });
        }
        if self.frozen.contains_key(&key) {
            return Ok(MutationOutcome::Unchanged);
        }

        let fingerprint = self.fingerprint(&key)?;
        self.frozen.insert(key.clone(), Some(fingerprint));
        info!(package = %key, "package frozen");
        Ok(MutationOutcome::Applied)
    }

    pub fn unfreeze(&mut self, key: &str) -> PackageResult<MutationOutcome> {
        self.require_freezing_mode("package unfreezing")?;
        let key = self.resolve_known(key)?;
        if self.frozen.remove(&key).is_none() {
            return Ok(MutationOutcome::Unchanged);
        }
        info!(package = %key, "package unfrozen");
        Ok(MutationOutcome::Applied)
    }

    /// Refreshes the fingerprint of a frozen package; `Applied` when the
    /// package contents changed since it was frozen.
    pub fn refreeze(&mut self, key: &str) -> PackageResult<MutationOutcome> {
        self.require_freezing_mode("package refreezing")?;
        let key = self.resolve_known(key)?;
        let Some(recorded) = self.frozen.get(&key).cloned() else {
            return Ok(MutationOutcome::Unchanged);
        };

        let fingerprint = self.fingerprint(&key)?;
        if recorded.as_deref() == Some(fingerprint.as_str()) {
            return Ok(MutationOutcome::Unchanged);
        }
        self.frozen.insert(key.clone(), Some(fingerprint));
        info!(package = %key, "package refrozen");
        Ok(MutationOutcome::Applied)
    }

    /// Removes the package from the registry and deletes its directory.
    ///
    /// The in-memory removal is committed before the directory is deleted;
    /// if deletion fails the error is returned and the registry still
    /// reports the package as gone while files remain on disk.
    pub fn delete(&mut self, key: &str) -> PackageResult<PackageDescriptor> {
        let key = self.resolve_known(key)?;
        if self.available[&key].is_protected() {
            return Err(PackageError::ProtectedPackage {
                key: key.to_string(),
                action: "deleted",
            });
        }

        if self.active.remove(&key) {
            self.frozen.remove(&key);
            debug!(package = %key, "deactivated package before deletion");
        }
        self.index.remove(&key.lookup_form());
        self.roots.retain(|_, owner| owner != &key);
        let descriptor = self
            .available
            .remove(&key)
            .ok_or_else(|| PackageError::unknown(key.as_str()))?;

        remove_package_dir(descriptor.root())?;
        info!(package = %key, path = %descriptor.root().display(), "package deleted");
        Ok(descriptor)
    }

    fn resolve_known(&self, key: &str) -> PackageResult<PackageKey> {
        self.resolve_case_insensitive(key)
            .cloned()
            .ok_or_else(|| PackageError::unknown(key))
    }

    fn require_freezing_mode(&self, operation: &'static str) -> PackageResult<()> {
        if self.options.mode.allows_freezing() {
            return Ok(());
        }
        Err(PackageError::UnsupportedRuntimeMode {
            operation,
            mode: self.options.mode.to_string(),
        })
    }

    fn fingerprint(&self, key: &PackageKey) -> PackageResult<String> {
        let root = self.available[key].root();
        fingerprint_directory(root)
            .map_err(|err| PackageError::io("failed fingerprinting package", root, err))
    }
}

fn canonical_root(path: &Path) -> PackageResult<PathBuf> {
    fs::canonicalize(path)
        .map_err(|_| PackageError::invalid_path(path, "package path does not exist"))
}
