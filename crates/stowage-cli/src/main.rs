mod completion;
mod render;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use semver::Version;
use stowage_core::PackageKey;
use stowage_manager::{
    CacheDirectorySink, CreateOptions, ManagerConfig, MutationOutcome, PackageFilter,
    PackageManager, PackageStateFilter, WorkspaceLayout,
};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::completion::{write_completions_script, CliCompletionShell};
use crate::render::{
    current_output_style, format_info_lines, format_order_lines, format_package_line,
    package_status_label, print_status, OutputStyle,
};

#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(about = "Discover, activate and freeze workspace packages", long_about = None)]
struct Cli {
    /// Workspace root containing stowage.toml; defaults to the current directory.
    #[arg(long, global = true, env = "STOWAGE_ROOT")]
    root: Option<PathBuf>,
    /// Runtime context, e.g. development or Production/Staging.
    #[arg(long, global = true)]
    context: Option<String>,
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List packages.
    List {
        #[arg(long, default_value = "available")]
        state: PackageStateFilter,
        #[arg(long)]
        group: Option<String>,
        #[arg(long = "type")]
        package_type: Option<String>,
    },
    Info {
        key: String,
    },
    /// Create a package skeleton and activate it.
    Create {
        key: String,
        #[arg(long = "type")]
        package_type: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        version: Option<String>,
        #[arg(long = "depends")]
        dependencies: Vec<PackageKey>,
        /// Directory to create the package in instead of its group.
        #[arg(long)]
        path: Option<PathBuf>,
    },
    Activate {
        key: String,
    },
    Deactivate {
        key: String,
    },
    Freeze {
        key: String,
    },
    Unfreeze {
        key: String,
    },
    Refreeze {
        key: String,
    },
    Delete {
        key: String,
    },
    /// Check a package's directory structure.
    Verify {
        key: String,
    },
    Rescan,
    /// Print active packages in load order.
    Order,
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    run_cli(cli)
}

fn run_cli(cli: Cli) -> Result<()> {
    let style = current_output_style();
    let root = cli.root.as_deref();
    let context = cli.context.as_deref();

    match cli.command {
        Commands::List {
            state,
            group,
            package_type,
        } => {
            let manager = open_manager(root, context)?;
            let filter = PackageFilter {
                state,
                group,
                package_type,
            };
            let packages = manager.list_filtered(&filter);
            if packages.is_empty() {
                println!("No packages found");
            }
            for descriptor in packages {
                let key = descriptor.key().as_str();
                let status = package_status_label(manager.is_active(key), manager.is_frozen(key));
                println!(
                    "{}",
                    format_package_line(key, status, &descriptor.root_path_string())
                );
            }
        }
        Commands::Info { key } => {
            let manager = open_manager(root, context)?;
            let descriptor = manager.get(&key)?;
            let canonical = descriptor.key().as_str();
            let status =
                package_status_label(manager.is_active(canonical), manager.is_frozen(canonical));
            let group = manager.group_of(descriptor);
            for line in format_info_lines(
                descriptor,
                status,
                group.as_deref(),
                manager.frozen_fingerprint(canonical),
            ) {
                println!("{line}");
            }
        }
        Commands::Create {
            key,
            package_type,
            description,
            version,
            dependencies,
            path,
        } => {
            let version = version
                .as_deref()
                .map(Version::parse)
                .transpose()
                .with_context(|| format!("invalid version for package {key}"))?;
            let options = CreateOptions {
                package_type,
                description,
                version,
                dependencies,
            };
            let mut manager = open_manager(root, context)?;
            let descriptor = manager.create_package(&key, options, path.as_deref())?;
            print_status(
                style,
                "ok",
                &format!(
                    "created {} at {}",
                    descriptor.key(),
                    descriptor.root().display()
                ),
            );
        }
        Commands::Activate { key } => {
            let outcome = open_manager(root, context)?.activate(&key)?;
            report_outcome(style, outcome, &key, "activated", "is already active");
        }
        Commands::Deactivate { key } => {
            let outcome = open_manager(root, context)?.deactivate(&key)?;
            report_outcome(style, outcome, &key, "deactivated", "is already inactive");
        }
        Commands::Freeze { key } => {
            let outcome = open_manager(root, context)?.freeze(&key)?;
            report_outcome(style, outcome, &key, "froze", "is already frozen");
        }
        Commands::Unfreeze { key } => {
            let outcome = open_manager(root, context)?.unfreeze(&key)?;
            report_outcome(style, outcome, &key, "unfroze", "is not frozen");
        }
        Commands::Refreeze { key } => {
            let outcome = open_manager(root, context)?.refreeze(&key)?;
            report_outcome(style, outcome, &key, "refroze", "is unchanged or not frozen");
        }
        Commands::Delete { key } => {
            let removed = open_manager(root, context)?.delete_package(&key)?;
            print_status(
                style,
                "ok",
                &format!("deleted {} from {}", removed.key(), removed.root().display()),
            );
        }
        Commands::Verify { key } => {
            let manager = open_manager(root, context)?;
            let descriptor = manager.verify(&key)?;
            print_status(style, "ok", &format!("{} is intact", descriptor.key()));
        }
        Commands::Rescan => {
            let mut manager = open_manager(root, context)?;
            manager.rescan()?;
            print_status(
                style,
                "ok",
                &format!(
                    "found {} packages ({} active)",
                    manager.list_available().len(),
                    manager.list_active().len()
                ),
            );
        }
        Commands::Order => {
            let manager = open_manager(root, context)?;
            for line in format_order_lines(&manager.load_order()) {
                println!("{line}");
            }
        }
        Commands::Completions { shell } => {
            let mut stdout = io::stdout().lock();
            write_completions_script(shell, &mut stdout)?;
            stdout.flush().context("failed flushing completion script")?;
        }
    }

    Ok(())
}

fn open_manager(root: Option<&Path>, context: Option<&str>) -> Result<PackageManager> {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };
    let mut config = ManagerConfig::load(&root)?;
    if let Some(context) = context {
        config
            .apply_context_override(context)
            .context("invalid --context value")?;
    }

    tracing::debug!(root = %root.display(), context = %config.context, "opening workspace");
    let layout = WorkspaceLayout::new(root.clone(), &config);
    let sink = CacheDirectorySink::new(layout.cache_dir());
    PackageManager::open(root, config, Box::new(sink))
}

fn report_outcome(
    style: OutputStyle,
    outcome: MutationOutcome,
    key: &str,
    applied: &str,
    unchanged: &str,
) {
    match outcome {
        MutationOutcome::Applied => print_status(style, "ok", &format!("{applied} {key}")),
        MutationOutcome::Unchanged => print_status(style, "skip", &format!("{key} {unchanged}")),
    }
}

fn init_tracing(verbosity: u8) {
    let default_level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

#[cfg(test)]
mod tests;
