mod config;
mod controller;
mod layout;
mod notify;
mod skeleton;

pub use config::{ManagerConfig, CONFIG_FILE_NAME, CONTEXT_ENV_VAR};
pub use controller::PackageManager;
pub use layout::WorkspaceLayout;
pub use notify::{CacheDirectorySink, NoopSink, PackageChange, PackageChangeSink};
pub use skeleton::CreateOptions;
pub use stowage_registry::{MutationOutcome, PackageFilter, PackageStateFilter};
