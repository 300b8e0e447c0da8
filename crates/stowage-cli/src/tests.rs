use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::CommandFactory;
use stowage_core::{PackageDescriptor, PackageManifest};

use super::*;
use crate::render::{render_status_line, styled_status_line};

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn cli_parses_list_filters() {
    let cli = Cli::try_parse_from([
        "stowage", "list", "--state", "active", "--group", "framework", "--type", "plugin",
    ])
    .expect("must parse");
    match cli.command {
        Commands::List {
            state,
            group,
            package_type,
        } => {
            assert_eq!(state, PackageStateFilter::Active);
            assert_eq!(group.as_deref(), Some("framework"));
            assert_eq!(package_type.as_deref(), Some("plugin"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_parses_create_options_and_global_flags() {
    let cli = Cli::try_parse_from([
        "stowage",
        "create",
        "Acme.Demo",
        "--depends",
        "Acme.Core",
        "--depends",
        "Acme.Http",
        "--version",
        "1.2.0",
        "--root",
        "/srv/app",
        "-vv",
    ])
    .expect("must parse");
    assert_eq!(cli.root.as_deref(), Some(Path::new("/srv/app")));
    assert_eq!(cli.verbose, 2);
    match cli.command {
        Commands::Create {
            key,
            dependencies,
            version,
            ..
        } => {
            assert_eq!(key, "Acme.Demo");
            assert_eq!(dependencies.len(), 2);
            assert_eq!(dependencies[1].as_str(), "Acme.Http");
            assert_eq!(version.as_deref(), Some("1.2.0"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_rejects_invalid_state_filter_and_dependency() {
    assert!(Cli::try_parse_from(["stowage", "list", "--state", "broken"]).is_err());
    assert!(
        Cli::try_parse_from(["stowage", "create", "Acme.Demo", "--depends", "acme"]).is_err()
    );
}

#[test]
fn completions_script_mentions_binary_name() {
    let mut output = Vec::new();
    write_completions_script(CliCompletionShell::Bash, &mut output)
        .expect("must write completions");
    let script = String::from_utf8(output).expect("script must be utf-8");
    assert!(script.contains("stowage"));
    assert!(script.contains("refreeze"));
}

#[test]
fn render_status_line_plain_is_unadorned() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "ok", "activated Acme.Demo"),
        "activated Acme.Demo"
    );
}

#[test]
fn render_status_line_rich_includes_ascii_badge() {
    assert_eq!(
        render_status_line(OutputStyle::Rich, "ok", "activated Acme.Demo"),
        "[OK] activated Acme.Demo"
    );
    assert_eq!(
        render_status_line(OutputStyle::Rich, "skip", "Acme.Demo is already active"),
        "[..] Acme.Demo is already active"
    );
}

#[test]
fn styled_status_line_colours_rich_output_only() {
    assert_eq!(
        styled_status_line(OutputStyle::Plain, "ok", "activated Acme.Demo"),
        "activated Acme.Demo"
    );
    let rich = styled_status_line(OutputStyle::Rich, "ok", "activated Acme.Demo");
    assert!(rich.starts_with('\u{1b}'));
    assert!(rich.contains("[OK] activated Acme.Demo"));
}

#[test]
fn package_status_label_reflects_flags() {
    assert_eq!(package_status_label(true, true), "active,frozen");
    assert_eq!(package_status_label(true, false), "active");
    assert_eq!(package_status_label(false, false), "inactive");
}

#[test]
fn format_package_line_aligns_columns() {
    let line = format_package_line("Acme.Demo", "active", "/srv/packages/Acme.Demo/");
    assert!(line.starts_with("Acme.Demo "));
    assert!(line.ends_with(" /srv/packages/Acme.Demo/"));
    assert!(line.contains(" active "));
}

#[test]
fn format_info_lines_lists_manifest_details() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create package dir");
    let manifest = PackageManifest::from_toml_str(
        "name = \"acme/demo\"\nversion = \"1.2.0\"\ndependencies = [\"Acme.Core\"]\n",
    )
    .expect("manifest must parse");
    let descriptor = PackageDescriptor::new(
        PackageKey::parse("Acme.Demo").expect("valid key"),
        &root,
        false,
        manifest,
    )
    .expect("descriptor must build");

    let lines = format_info_lines(&descriptor, "active", Some("application"), None);
    assert_eq!(lines[0], "Package: Acme.Demo");
    assert!(lines.contains(&"Type: library".to_string()));
    assert!(lines.contains(&"Version: 1.2.0".to_string()));
    assert!(lines.contains(&"Group: application".to_string()));
    assert!(lines.contains(&"Dependencies: Acme.Core".to_string()));
    assert!(!lines.iter().any(|line| line.starts_with("Fingerprint")));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn format_order_lines_numbers_packages() {
    let core = PackageKey::parse("Acme.Core").expect("valid key");
    let app = PackageKey::parse("Acme.App").expect("valid key");
    assert_eq!(
        format_order_lines(&[&core, &app]),
        vec!["  1. Acme.Core", "  2. Acme.App"]
    );
}

#[test]
fn open_manager_uses_workspace_config() {
    let root = test_root();
    fs::create_dir_all(&root).expect("must create root");
    fs::write(
        root.join("stowage.toml"),
        "groups = [\"framework\"]\ndefault-group = \"framework\"\n",
    )
    .expect("must write config");

    let manager =
        open_manager(Some(root.as_path()), Some("production")).expect("manager must open");
    assert_eq!(manager.mode(), stowage_core::RuntimeMode::Production);
    assert!(root.join("packages/framework").is_dir());
    assert!(!root.join("packages/application").exists());

    assert!(open_manager(Some(root.as_path()), Some("nightly")).is_err());

    let _ = fs::remove_dir_all(&root);
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
        "stowage-cli-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        counter
    ));
    path
}
