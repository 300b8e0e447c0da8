use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use stowage_core::{PackageError, PackageKey, PackageManifest, RuntimeMode};

use super::*;
use crate::state::parse_state_file;

#[test]
fn scan_derives_keys_from_relative_paths() {
    let root = test_root();
    let base = root.join("packages");
    write_package(&base, "Acme/Demo", "");
    write_package(&base, "Acme/Http/Client", "");
    fs::create_dir_all(base.join(".git/Acme/Hidden")).expect("must create hidden dir");
    fs::write(base.join(".git/Acme/Hidden/package.toml"), "").expect("must write manifest");

    let discovered = PathScanner::new().scan(&[base]).expect("scan must succeed");
    let keys: Vec<&str> = discovered.iter().map(|package| package.key.as_str()).collect();
    assert_eq!(keys, vec!["Acme.Demo", "Acme.Http.Client"]);
    assert!(discovered.iter().all(|package| package.path.is_absolute()));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn scan_prefers_manifest_key_over_directory_names() {
    let root = test_root();
    let base = root.join("packages");
    write_package(&base, "vendor/http", "key = \"Acme.Http\"\n");

    let discovered = PathScanner::new().scan(&[base]).expect("scan must succeed");
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].key.as_str(), "Acme.Http");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn scan_skips_directories_without_a_valid_key() {
    let root = test_root();
    let base = root.join("packages");
    write_package(&base, "lowercase/pkg", "");
    write_package(&base, "Acme/Demo", "");

    let discovered = PathScanner::new().scan(&[base]).expect("scan must succeed");
    assert_eq!(discovered.len(), 1);
    assert_eq!(discovered[0].key.as_str(), "Acme.Demo");

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn scan_honors_exclude_patterns() {
    let root = test_root();
    let base = root.join("packages");
    write_package(&base, "Acme/Demo", "");
    write_package(&base, "Acme/Skipped", "");

    let scanner = PathScanner::new()
        .with_excludes(vec![Regex::new("^Acme/Skip").expect("valid regex")]);
    let discovered = scanner.scan(&[base]).expect("scan must succeed");
    let keys: Vec<&str> = discovered.iter().map(|package| package.key.as_str()).collect();
    assert_eq!(keys, vec!["Acme.Demo"]);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn scan_fails_when_depth_limit_is_exceeded() {
    let root = test_root();
    let base = root.join("packages");
    fs::create_dir_all(base.join("A/B/C")).expect("must create nested dirs");

    let err = PathScanner::new()
        .with_max_depth(2)
        .scan(&[base])
        .expect_err("scan must fail");
    assert!(matches!(
        err,
        PackageError::ScanDepthExceeded { max_depth: 2, .. }
    ));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn scan_descends_into_collections() {
    let root = test_root();
    let base = root.join("packages");
    write_package(&base, "Bundle", "type = \"collection\"\n");
    write_package(&base, "Bundle/inner", "key = \"Acme.Inner\"\n");

    let discovered = PathScanner::new().scan(&[base]).expect("scan must succeed");
    let keys: Vec<&str> = discovered.iter().map(|package| package.key.as_str()).collect();
    assert_eq!(keys, vec!["Acme.Inner"]);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn scan_rejects_case_insensitive_duplicates() {
    let root = test_root();
    let base = root.join("packages");
    write_package(&base, "Acme/Demo", "");
    write_package(&base, "other", "key = \"ACME.DEMO\"\n");

    let err = PathScanner::new().scan(&[base]).expect_err("scan must fail");
    assert!(matches!(err, PackageError::DuplicatePackage { .. }));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn scan_skips_unreadable_manifests_unless_strict() {
    let root = test_root();
    let base = root.join("packages");
    write_package(&base, "Acme/Broken", "dependencies = [\n");
    write_package(&base, "Acme/Demo", "");

    let discovered = PathScanner::new()
        .scan(std::slice::from_ref(&base))
        .expect("scan must succeed");
    assert_eq!(discovered.len(), 1);

    let err = PathScanner::new()
        .with_strict_manifests(true)
        .scan(&[base])
        .expect_err("strict scan must fail");
    assert!(matches!(err, PackageError::CorruptPackage { .. }));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn scan_reports_missing_base_directory() {
    let root = test_root();
    let err = PathScanner::new()
        .scan(&[root.join("missing")])
        .expect_err("scan must fail");
    assert!(matches!(err, PackageError::InvalidPackagePath { .. }));
}

#[test]
fn state_store_load_defaults_when_file_is_missing() {
    let root = test_root();
    let store = StateStore::new(root.join("PackageStates.json"));
    let state = store.load().expect("load must succeed");
    assert!(state.is_empty());
    assert_eq!(state.version, STATE_FORMAT_VERSION);
}

#[test]
fn state_store_save_writes_camel_case_json_without_temp_files() {
    let root = test_root();
    let store = StateStore::new(root.join("state/PackageStates.json"));
    let mut state = RegistryState::default();
    state.packages.insert(
        key("Acme.Demo"),
        PackageStateEntry {
            package_path: "/srv/packages/Acme.Demo/".to_string(),
            state: ActivationState::Active,
            frozen: true,
            frozen_fingerprint: Some("sha256:abc".to_string()),
        },
    );

    store.save(&state).expect("save must succeed");
    let raw = fs::read_to_string(store.path()).expect("must read state file");
    assert!(raw.contains("\"packagePath\""));
    assert!(raw.contains("\"frozenFingerprint\""));
    assert!(raw.ends_with('\n'));

    let entries: Vec<_> = fs::read_dir(root.join("state"))
        .expect("must list state dir")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(entries.len(), 1);

    assert_eq!(store.load().expect("load must succeed"), state);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn state_file_with_outdated_version_is_discarded() {
    let parsed = parse_state_file(
        r#"{"version":0,"packages":{"Acme.Demo":{"packagePath":"/x/","state":"active"}}}"#,
        Path::new("PackageStates.json"),
    )
    .expect("must parse");
    assert!(parsed.is_empty());

    let unversioned = parse_state_file(r#"{"packages":{}}"#, Path::new("PackageStates.json"))
        .expect("must parse");
    assert!(unversioned.is_empty());
}

#[test]
fn state_file_corruption_is_reported() {
    for raw in ["not json", "[]", r#"{"version":99,"packages":{}}"#] {
        let err = parse_state_file(raw, Path::new("PackageStates.json"))
            .expect_err("state must be rejected");
        assert!(
            matches!(err, PackageError::CorruptStateFile { .. }),
            "unexpected error for {raw}: {err}"
        );
    }
}

#[test]
fn state_entry_lookup_ignores_case() {
    let parsed = parse_state_file(
        r#"{"version":1,"packages":{"Acme.Demo":{"packagePath":"/x/","state":"inactive"}}}"#,
        Path::new("PackageStates.json"),
    )
    .expect("must parse");
    let (found, entry) = parsed.entry("acme.DEMO").expect("entry must exist");
    assert_eq!(found.as_str(), "Acme.Demo");
    assert_eq!(entry.state, ActivationState::Inactive);
    assert!(!entry.frozen);
}

#[test]
fn initialize_scans_and_persists_state() {
    let fixture = Fixture::new(RuntimeMode::Production);
    write_package(&fixture.base, "Acme/Demo", "");
    write_package(&fixture.base, "Acme/Http", "");

    let registry = fixture.initialize().expect("registry must initialize");
    assert_eq!(registry.available().len(), 2);
    assert!(registry.is_active("Acme.Demo"));
    assert!(registry.is_active("Acme.Http"));

    let state = fixture.store.load().expect("state must load");
    let (_, entry) = state.entry("Acme.Demo").expect("entry must exist");
    assert!(entry.package_path.ends_with(std::path::MAIN_SEPARATOR));
    assert_eq!(entry.state, ActivationState::Active);
    assert_eq!(state, registry.to_state());
}

#[test]
fn production_initialize_trusts_persisted_state() {
    let fixture = Fixture::new(RuntimeMode::Production);
    write_package(&fixture.base, "Acme/Demo", "");
    let mut registry = fixture.initialize().expect("registry must initialize");
    registry.deactivate("Acme.Demo").expect("must deactivate");
    fixture
        .store
        .save(&registry.to_state())
        .expect("state must save");

    write_package(&fixture.base, "Acme/Later", "");
    let reloaded = fixture.initialize().expect("registry must reload");
    assert!(!reloaded.is_active("Acme.Demo"));
    assert!(!reloaded.is_available("Acme.Later"));
    assert_eq!(reloaded.to_state(), registry.to_state());
}

#[test]
fn development_initialize_rescans_and_keeps_activation() {
    let fixture = Fixture::new(RuntimeMode::Development);
    write_package(&fixture.base, "Acme/Demo", "");
    let mut registry = fixture.initialize().expect("registry must initialize");
    registry.deactivate("Acme.Demo").expect("must deactivate");
    fixture
        .store
        .save(&registry.to_state())
        .expect("state must save");

    write_package(&fixture.base, "Acme/Later", "");
    let reloaded = fixture.initialize().expect("registry must reload");
    assert!(!reloaded.is_active("Acme.Demo"));
    assert!(reloaded.is_active("Acme.Later"));
}

#[test]
fn initialize_prunes_stale_state_entries() {
    let fixture = Fixture::new(RuntimeMode::Production);
    let demo = write_package(&fixture.base, "Acme/Demo", "");
    let demo_path = stowage_core::with_trailing_separator(
        &fs::canonicalize(&demo).expect("must canonicalize"),
    );
    let gone_path = stowage_core::with_trailing_separator(&fixture.base.join("Acme/Gone"));
    let no_separator = demo_path.trim_end_matches(std::path::MAIN_SEPARATOR).to_string();
    let raw = serde_json::json!({
        "version": 1,
        "packages": {
            "Acme.Demo": { "packagePath": demo_path, "state": "active" },
            "Acme.Gone": { "packagePath": gone_path, "state": "active" },
            "Acme.Bare": { "packagePath": no_separator, "state": "inactive" },
        }
    });
    fs::create_dir_all(fixture.store.path().parent().expect("parent")).expect("must create dir");
    fs::write(fixture.store.path(), raw.to_string()).expect("must write state");

    let registry = fixture.initialize().expect("registry must initialize");
    let keys: Vec<&str> = registry.available().keys().map(PackageKey::as_str).collect();
    assert_eq!(keys, vec!["Acme.Demo"]);

    let persisted = fixture.store.load().expect("state must load");
    assert_eq!(persisted.packages.len(), 1);
}

#[test]
fn initialize_rejects_corrupt_state_file() {
    let fixture = Fixture::new(RuntimeMode::Production);
    write_package(&fixture.base, "Acme/Demo", "");
    fs::create_dir_all(fixture.store.path().parent().expect("parent")).expect("must create dir");
    fs::write(fixture.store.path(), "{ broken").expect("must write state");

    let err = fixture.initialize().expect_err("initialize must fail");
    assert!(matches!(err, PackageError::CorruptStateFile { .. }));
}

#[test]
fn initialize_is_all_or_nothing_on_duplicates() {
    let fixture = Fixture::new(RuntimeMode::Development);
    write_package(&fixture.base, "Acme/Demo", "");
    write_package(&fixture.base, "other", "key = \"Acme.Demo\"\n");

    let err = fixture.initialize().expect_err("initialize must fail");
    assert!(matches!(err, PackageError::DuplicatePackage { .. }));
    assert!(!fixture.store.path().exists());
}

#[test]
fn strict_validation_reports_incomplete_packages() {
    let mut fixture = Fixture::new(RuntimeMode::Development);
    let demo = write_package(&fixture.base, "Acme/Demo", "");
    fs::remove_dir_all(demo.join("classes")).expect("must remove classes dir");
    fixture.options.strict_validation = true;

    let err = fixture.initialize().expect_err("initialize must fail");
    assert!(matches!(err, PackageError::CorruptPackage { .. }));
}

#[test]
fn protected_packages_stay_active() {
    let mut fixture = Fixture::new(RuntimeMode::Production);
    write_package(&fixture.base, "Acme/Core", "");
    write_package(&fixture.base, "Acme/Demo", "");
    fixture.options.protected = vec![key("Acme.Core")];
    fixture.options.inactive_by_default = vec![key("Acme.Core"), key("Acme.Demo")];

    let mut registry = fixture.initialize().expect("registry must initialize");
    assert!(registry.is_active("Acme.Core"));
    assert!(!registry.is_active("Acme.Demo"));
    let before = registry.to_state();

    let err = registry
        .deactivate("acme.core")
        .expect_err("protected package must stay active");
    assert!(matches!(err, PackageError::ProtectedPackage { .. }));
    assert_eq!(registry.to_state(), before);

    let err = registry
        .delete("Acme.Core")
        .expect_err("protected package must not be deleted");
    assert!(matches!(err, PackageError::ProtectedPackage { .. }));
    assert_eq!(registry.to_state(), before);
    assert!(registry.is_active("Acme.Core"));
    assert!(registry.available().contains_key(&key("Acme.Core")));
    assert!(fixture.base.join("Acme/Core/package.toml").is_file());
}

#[test]
fn lookups_ignore_case() {
    let fixture = Fixture::new(RuntimeMode::Development);
    write_package(&fixture.base, "Acme/Demo", "");
    let registry = fixture.initialize().expect("registry must initialize");

    assert!(registry.is_available("acme.demo"));
    assert!(registry.is_active("ACME.DEMO"));
    assert_eq!(
        registry
            .resolve_case_insensitive("aCmE.dEmO")
            .map(PackageKey::as_str),
        Some("Acme.Demo")
    );
    assert_eq!(
        registry.get("acme.demo").expect("must resolve").key().as_str(),
        "Acme.Demo"
    );
    assert!(matches!(
        registry.get("Acme.Missing"),
        Err(PackageError::UnknownPackage { .. })
    ));
}

#[test]
fn activation_mutations_report_outcomes() {
    let fixture = Fixture::new(RuntimeMode::Development);
    write_package(&fixture.base, "Acme/Demo", "");
    let mut registry = fixture.initialize().expect("registry must initialize");

    assert_eq!(
        registry.activate("Acme.Demo").expect("must activate"),
        MutationOutcome::Unchanged
    );
    assert!(registry
        .deactivate("Acme.Demo")
        .expect("must deactivate")
        .is_applied());
    let err = registry
        .deactivate("Acme.Demo")
        .expect_err("inactive package cannot be deactivated");
    assert!(matches!(err, PackageError::InvalidPackageState { .. }));
    assert!(registry
        .activate("acme.demo")
        .expect("must activate")
        .is_applied());
    assert!(matches!(
        registry.activate("Acme.Missing"),
        Err(PackageError::UnknownPackage { .. })
    ));
}

#[test]
fn freeze_is_idempotent_and_tracks_content() {
    let fixture = Fixture::new(RuntimeMode::Development);
    let demo = write_package(&fixture.base, "Acme/Demo", "");
    let mut registry = fixture.initialize().expect("registry must initialize");

    assert_eq!(
        registry.freeze("Acme.Demo").expect("must freeze"),
        MutationOutcome::Applied
    );
    let fingerprint = registry
        .frozen_fingerprint("Acme.Demo")
        .expect("fingerprint must be recorded")
        .to_string();
    assert!(fingerprint.starts_with("sha256:"));
    assert_eq!(
        registry.freeze("acme.demo").expect("must freeze"),
        MutationOutcome::Unchanged
    );
    assert_eq!(
        registry.refreeze("Acme.Demo").expect("must refreeze"),
        MutationOutcome::Unchanged
    );

    fs::write(demo.join("classes/Service.txt"), "changed").expect("must write file");
    assert_eq!(
        registry.refreeze("Acme.Demo").expect("must refreeze"),
        MutationOutcome::Applied
    );
    assert_ne!(registry.frozen_fingerprint("Acme.Demo"), Some(fingerprint.as_str()));

    assert!(registry.unfreeze("Acme.Demo").expect("must unfreeze").is_applied());
    assert_eq!(
        registry.unfreeze("Acme.Demo").expect("must unfreeze"),
        MutationOutcome::Unchanged
    );
    assert!(!registry.is_frozen("Acme.Demo"));
}

#[test]
fn freezing_requires_development_mode() {
    let fixture = Fixture::new(RuntimeMode::Production);
    write_package(&fixture.base, "Acme/Demo", "");
    let mut registry = fixture.initialize().expect("registry must initialize");

    for result in [
        registry.freeze("Acme.Demo"),
        registry.unfreeze("Acme.Demo"),
        registry.refreeze("Acme.Demo"),
    ] {
        assert!(matches!(
            result,
            Err(PackageError::UnsupportedRuntimeMode { .. })
        ));
    }
}

#[test]
fn frozen_packages_are_always_active() {
    let fixture = Fixture::new(RuntimeMode::Development);
    write_package(&fixture.base, "Acme/Demo", "");
    let mut registry = fixture.initialize().expect("registry must initialize");

    registry.freeze("Acme.Demo").expect("must freeze");
    registry.deactivate("Acme.Demo").expect("must deactivate");
    assert!(!registry.is_frozen("Acme.Demo"));

    let err = registry
        .freeze("Acme.Demo")
        .expect_err("inactive package cannot be frozen");
    assert!(matches!(err, PackageError::InvalidPackageState { .. }));

    let state = registry.to_state();
    for entry in state.packages.values() {
        assert!(!entry.frozen || entry.state.is_active());
    }
}

#[test]
fn frozen_flag_survives_reload() {
    let fixture = Fixture::new(RuntimeMode::Development);
    write_package(&fixture.base, "Acme/Demo", "");
    let mut registry = fixture.initialize().expect("registry must initialize");
    registry.freeze("Acme.Demo").expect("must freeze");
    fixture
        .store
        .save(&registry.to_state())
        .expect("state must save");

    let reloaded = fixture.initialize().expect("registry must reload");
    assert!(reloaded.is_frozen("Acme.Demo"));
    assert_eq!(
        reloaded.frozen_fingerprint("Acme.Demo"),
        registry.frozen_fingerprint("Acme.Demo")
    );
}

#[test]
fn register_and_delete_package() {
    let fixture = Fixture::new(RuntimeMode::Development);
    write_package(&fixture.base, "Acme/Demo", "");
    let mut registry = fixture.initialize().expect("registry must initialize");

    let fresh = write_package(&fixture.base, "Acme/Fresh", "");
    let descriptor = registry
        .factory()
        .create(key("Acme.Fresh"), &fresh, PackageManifest::default())
        .expect("descriptor must build");
    registry.register(descriptor).expect("must register");
    assert!(registry.is_available("Acme.Fresh"));
    assert!(!registry.is_active("Acme.Fresh"));

    registry.activate("Acme.Fresh").expect("must activate");
    registry.freeze("Acme.Fresh").expect("must freeze");
    let removed = registry.delete("acme.fresh").expect("must delete");
    assert_eq!(removed.key().as_str(), "Acme.Fresh");
    assert!(!registry.is_available("Acme.Fresh"));
    assert!(!registry.is_active("Acme.Fresh"));
    assert!(!registry.is_frozen("Acme.Fresh"));
    assert!(!fresh.exists());
    assert!(!registry.to_state().packages.contains_key(&key("Acme.Fresh")));
}

#[test]
fn register_rejects_duplicate_keys_and_roots() {
    let fixture = Fixture::new(RuntimeMode::Development);
    let demo = write_package(&fixture.base, "Acme/Demo", "");
    let mut registry = fixture.initialize().expect("registry must initialize");

    let same_key = registry
        .factory()
        .create(
            key("ACME.DEMO"),
            &write_package(&fixture.base, "Acme/Other", ""),
            PackageManifest::default(),
        )
        .expect("descriptor must build");
    assert!(matches!(
        registry.register(same_key),
        Err(PackageError::DuplicatePackage { .. })
    ));

    let same_root = registry
        .factory()
        .create(key("Acme.Alias"), &demo, PackageManifest::default())
        .expect("descriptor must build");
    assert!(matches!(
        registry.register(same_root),
        Err(PackageError::DuplicatePackage { .. })
    ));
    assert_eq!(registry.available().len(), 1);
}

#[test]
fn load_order_puts_dependencies_first() {
    let fixture = Fixture::new(RuntimeMode::Development);
    write_package(
        &fixture.base,
        "Acme/App",
        "dependencies = [\"Acme.Lib\", \"Vendor.Missing\"]\n",
    );
    write_package(&fixture.base, "Acme/Lib", "dependencies = [\"Acme.Core\"]\n");
    write_package(&fixture.base, "Acme/Core", "dependencies = [\"Acme.App\"]\n");
    let registry = fixture.initialize().expect("registry must initialize");

    let order: Vec<&str> = registry.load_order().into_iter().map(PackageKey::as_str).collect();
    assert_eq!(order, vec!["Acme.Core", "Acme.Lib", "Acme.App"]);
}

#[test]
fn load_order_skips_inactive_packages() {
    let fixture = Fixture::new(RuntimeMode::Development);
    write_package(&fixture.base, "Acme/App", "dependencies = [\"Acme.Lib\"]\n");
    write_package(&fixture.base, "Acme/Lib", "");
    let mut registry = fixture.initialize().expect("registry must initialize");
    registry.deactivate("Acme.Lib").expect("must deactivate");

    let order: Vec<&str> = registry.load_order().into_iter().map(PackageKey::as_str).collect();
    assert_eq!(order, vec!["Acme.App"]);
}

#[test]
fn filtered_matches_state_group_and_type() {
    let root = test_root();
    let application = root.join("Application");
    let framework = root.join("Framework");
    write_package(&application, "Acme/Site", "type = \"site\"\n");
    write_package(&framework, "Acme/Core", "");
    write_package(&framework, "Acme/Extra", "");
    let store = StateStore::new(root.join("state/PackageStates.json"));
    let options = RegistryOptions {
        base_dirs: vec![application, framework],
        mode: RuntimeMode::Development,
        ..RegistryOptions::default()
    };
    let mut registry =
        PackageRegistry::initialize(&store, &PathScanner::new(), options).expect("must init");
    registry.deactivate("Acme.Extra").expect("must deactivate");

    let names = |filter: PackageFilter| -> Vec<String> {
        registry
            .filtered(&filter)
            .into_iter()
            .map(|descriptor| descriptor.key().to_string())
            .collect()
    };

    assert_eq!(
        names(PackageFilter::default()),
        vec!["Acme.Core", "Acme.Extra", "Acme.Site"]
    );
    assert_eq!(
        names(PackageFilter {
            state: PackageStateFilter::Active,
            group: Some("Framework".to_string()),
            package_type: None,
        }),
        vec!["Acme.Core"]
    );
    assert_eq!(
        names(PackageFilter {
            package_type: Some("site".to_string()),
            ..PackageFilter::default()
        }),
        vec!["Acme.Site"]
    );
    assert!(names(PackageFilter {
        state: PackageStateFilter::Frozen,
        ..PackageFilter::default()
    })
    .is_empty());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn package_state_filter_parses_names() {
    assert_eq!(
        "Active".parse::<PackageStateFilter>(),
        Ok(PackageStateFilter::Active)
    );
    assert_eq!(
        "frozen".parse::<PackageStateFilter>(),
        Ok(PackageStateFilter::Frozen)
    );
    assert!("broken".parse::<PackageStateFilter>().is_err());
}

#[test]
fn rescan_drops_removed_packages() {
    let fixture = Fixture::new(RuntimeMode::Production);
    write_package(&fixture.base, "Acme/Demo", "");
    let gone = write_package(&fixture.base, "Acme/Gone", "");
    let mut registry = fixture.initialize().expect("registry must initialize");
    registry.deactivate("Acme.Demo").expect("must deactivate");

    fs::remove_dir_all(&gone).expect("must remove package");
    registry.rescan(&PathScanner::new()).expect("rescan must succeed");
    assert!(!registry.is_available("Acme.Gone"));
    assert!(registry.is_available("Acme.Demo"));
    assert!(!registry.is_active("Acme.Demo"));
}

struct Fixture {
    root: PathBuf,
    base: PathBuf,
    store: StateStore,
    options: RegistryOptions,
}

impl Fixture {
    fn new(mode: RuntimeMode) -> Self {
        let root = test_root();
        let base = root.join("packages");
        fs::create_dir_all(&base).expect("must create base dir");
        let store = StateStore::new(root.join("state/PackageStates.json"));
        let options = RegistryOptions {
            base_dirs: vec![base.clone()],
            mode,
            ..RegistryOptions::default()
        };
        Self {
            root,
            base,
            store,
            options,
        }
    }

    fn initialize(&self) -> stowage_core::PackageResult<PackageRegistry> {
        PackageRegistry::initialize(&self.store, &PathScanner::new(), self.options.clone())
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn key(value: &str) -> PackageKey {
    PackageKey::parse(value).expect("key must be valid")
}

fn write_package(base: &Path, relative: &str, manifest: &str) -> PathBuf {
    let dir = base.join(relative);
    fs::create_dir_all(dir.join("classes")).expect("must create package dirs");
    fs::write(dir.join("package.toml"), manifest).expect("must write manifest");
    dir
}

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_root() -> PathBuf {
    let mut path = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let counter = TEST_ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
    path.push(format!(
        "stowage-registry-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    path
}
