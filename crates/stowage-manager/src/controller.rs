use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stowage_core::{
    validate_key_reference, PackageDescriptor, PackageError, PackageKey, PackageResult,
    RuntimeMode,
};
use stowage_registry::{
    MutationOutcome, PackageFilter, PackageRegistry, PathScanner, RegistryOptions, StateStore,
};
use tracing::{info, warn};

use crate::skeleton::write_skeleton;
use crate::{CreateOptions, ManagerConfig, PackageChange, PackageChangeSink, WorkspaceLayout};

/// Entry point for every package operation of one workspace.
///
/// Mutations persist the package states before the change sink is told
/// about them; a failing sink is logged and otherwise ignored.
pub struct PackageManager {
    config: ManagerConfig,
    layout: WorkspaceLayout,
    scanner: PathScanner,
    store: StateStore,
    registry: PackageRegistry,
    sink: Box<dyn PackageChangeSink>,
}

impl PackageManager {
    pub fn open(
        root: impl Into<PathBuf>,
        config: ManagerConfig,
        sink: Box<dyn PackageChangeSink>,
    ) -> Result<Self> {
        config.validate()?;
        let layout = WorkspaceLayout::new(root, &config);
        layout.ensure_base_dirs()?;
        let scanner = config.scanner()?;
        let store = StateStore::new(layout.state_file_path());

        let options = RegistryOptions {
            base_dirs: layout.base_dirs().to_vec(),
            mode: config.context,
            protected: config.protected.clone(),
            inactive_by_default: config.inactive_by_default.clone(),
            strict_validation: config.strict_validation,
        };
        let registry = PackageRegistry::initialize(&store, &scanner, options).with_context(|| {
            format!(
                "failed loading package states: {}",
                layout.state_file_path().display()
            )
        })?;

        Ok(Self {
            config,
            layout,
            scanner,
            store,
            registry,
            sink,
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn mode(&self) -> RuntimeMode {
        self.registry.mode()
    }

    pub fn registry(&self) -> &PackageRegistry {
        &self.registry
    }

    pub fn list_available(&self) -> Vec<&PackageDescriptor> {
        self.registry.available().values().collect()
    }

    pub fn list_active(&self) -> Vec<&PackageDescriptor> {
        self.registry.active()
    }

    pub fn list_frozen(&self) -> Vec<&PackageDescriptor> {
        self.registry.frozen()
    }

    pub fn list_filtered(&self, filter: &PackageFilter) -> Vec<&PackageDescriptor> {
        self.registry.filtered(filter)
    }

    pub fn load_order(&self) -> Vec<&PackageKey> {
        self.registry.load_order()
    }

    pub fn group_of(&self, descriptor: &PackageDescriptor) -> Option<String> {
        self.registry.group_of(descriptor)
    }

    pub fn get(&self, key: &str) -> PackageResult<&PackageDescriptor> {
        let key = self.resolve(key)?;
        self.registry.get(key.as_str())
    }

    /// Resolves the package and checks its on-disk structure.
    pub fn verify(&self, key: &str) -> PackageResult<&PackageDescriptor> {
        let key = self.resolve(key)?;
        self.registry.get_verified(key.as_str())
    }

    pub fn is_available(&self, key: &str) -> bool {
        self.registry.is_available(key)
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.registry.is_active(key)
    }

    pub fn is_frozen(&self, key: &str) -> bool {
        self.registry.is_frozen(key)
    }

    pub fn frozen_fingerprint(&self, key: &str) -> Option<&str> {
        self.registry.frozen_fingerprint(key)
    }

    /// Writes a new package skeleton, registers it and activates it.
    ///
    /// Without `base_path` the package goes to the directory configured for
    /// its type, or to the default group.
    pub fn create_package(
        &mut self,
        key: &str,
        options: CreateOptions,
        base_path: Option<&Path>,
    ) -> PackageResult<&PackageDescriptor> {
        let key = PackageKey::parse(key)?;
        let target_dir = self.target_dir(&options, base_path);

        if let Some(existing) = self.registry.resolve_case_insensitive(key.as_str()) {
            let existing = self.registry.get(existing.as_str())?;
            return Err(PackageError::DuplicatePackage {
                key: key.to_string(),
                first: existing.root().to_path_buf(),
                second: target_dir.join(key.as_str()),
            });
        }
        if options
            .dependencies
            .iter()
            .any(|dependency| dependency.eq_ignore_case(key.as_str()))
        {
            return Err(PackageError::InvalidPackageState {
                key: key.to_string(),
                reason: "cannot depend on itself".to_string(),
            });
        }
        if !target_dir.is_dir() {
            return Err(PackageError::invalid_path(
                target_dir,
                "package base path does not exist",
            ));
        }
        let package_dir = fs::canonicalize(&target_dir)
            .map_err(|err| {
                PackageError::io("failed resolving package base path", &target_dir, err)
            })?
            .join(key.as_str());

        let manifest = options.manifest_for(&key);
        write_skeleton(&package_dir, &manifest)?;
        let registered = self
            .registry
            .factory()
            .create(key.clone(), &package_dir, manifest)
            .and_then(|descriptor| self.registry.register(descriptor));
        if let Err(err) = registered {
            let _ = fs::remove_dir_all(&package_dir);
            return Err(err);
        }
        self.registry.activate(key.as_str())?;

        self.save()?;
        info!(package = %key, path = %package_dir.display(), "package created");
        self.notify(PackageChange::Created(key.clone()));
        self.registry.get(key.as_str())
    }

    pub fn activate(&mut self, key: &str) -> PackageResult<MutationOutcome> {
        let key = self.resolve(key)?;
        let outcome = self.registry.activate(key.as_str())?;
        self.commit(outcome, PackageChange::Activated(key))
    }

    pub fn deactivate(&mut self, key: &str) -> PackageResult<MutationOutcome> {
        let key = self.resolve(key)?;
        let outcome = self.registry.deactivate(key.as_str())?;
        self.commit(outcome, PackageChange::Deactivated(key))
    }

    pub fn freeze(&mut self, key: &str) -> PackageResult<MutationOutcome> {
        let key = self.resolve(key)?;
        let outcome = self.registry.freeze(key.as_str())?;
        self.commit(outcome, PackageChange::Frozen(key))
    }

    pub fn unfreeze(&mut self, key: &str) -> PackageResult<MutationOutcome> {
        let key = self.resolve(key)?;
        let outcome = self.registry.unfreeze(key.as_str())?;
        self.commit(outcome, PackageChange::Unfrozen(key))
    }

    pub fn refreeze(&mut self, key: &str) -> PackageResult<MutationOutcome> {
        let key = self.resolve(key)?;
        let outcome = self.registry.refreeze(key.as_str())?;
        self.commit(outcome, PackageChange::Refrozen(key))
    }

    /// Deletes a package. The package states are saved even when removing
    /// the directory fails; that error is returned afterwards. If saving
    /// fails too, the save error is returned and both are logged.
    pub fn delete_package(&mut self, key: &str) -> PackageResult<PackageDescriptor> {
        let key = self.resolve(key)?;
        match self.registry.delete(key.as_str()) {
            Ok(descriptor) => {
                self.save()?;
                self.notify(PackageChange::Deleted(key));
                Ok(descriptor)
            }
            Err(err @ PackageError::Io { .. }) => {
                warn!(package = %key, error = %err, "package unregistered but its files remain");
                if let Err(save_err) = self.save() {
                    warn!(
                        package = %key,
                        error = %save_err,
                        removal_error = %err,
                        "package states not saved after failed deletion"
                    );
                    return Err(save_err);
                }
                self.notify(PackageChange::Deleted(key));
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Rescans the base directories and saves the result.
    pub fn rescan(&mut self) -> PackageResult<()> {
        self.registry.rescan(&self.scanner)?;
        self.save()?;
        self.notify(PackageChange::Rescanned);
        Ok(())
    }

    fn resolve(&self, key: &str) -> PackageResult<PackageKey> {
        validate_key_reference(key)?;
        self.registry
            .resolve_case_insensitive(key)
            .cloned()
            .ok_or_else(|| PackageError::unknown(key))
    }

    fn target_dir(&self, options: &CreateOptions, base_path: Option<&Path>) -> PathBuf {
        if let Some(base_path) = base_path {
            return if base_path.is_absolute() {
                base_path.to_path_buf()
            } else {
                self.layout.root().join(base_path)
            };
        }

        let group = self
            .config
            .paths_by_type
            .get(options.package_type())
            .unwrap_or(&self.config.default_group);
        self.layout.group_dir(group)
    }

    fn commit(
        &mut self,
        outcome: MutationOutcome,
        change: PackageChange,
    ) -> PackageResult<MutationOutcome> {
        if outcome.is_applied() {
            self.save()?;
            self.notify(change);
        }
        Ok(outcome)
    }

    fn save(&self) -> PackageResult<()> {
        self.store.save(&self.registry.to_state())
    }

    fn notify(&self, change: PackageChange) {
        if let Err(err) = self.sink.packages_changed(&change) {
            warn!(
                action = change.action(),
                error = %format!("{err:#}"),
                "package change notification failed"
            );
        }
    }
}
