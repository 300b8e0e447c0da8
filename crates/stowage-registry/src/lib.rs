mod factory;
mod fs_ops;
mod order;
mod registry;
mod scanner;
mod state;
mod state_store;

pub use factory::DescriptorFactory;
pub use registry::{
    MutationOutcome, PackageFilter, PackageRegistry, PackageStateFilter, RegistryOptions,
};
pub use scanner::{DiscoveredPackage, PathScanner, DEFAULT_MAX_SCAN_DEPTH};
pub use state::{
    ActivationState, PackageStateEntry, RegistryState, MIN_SUPPORTED_STATE_VERSION,
    STATE_FORMAT_VERSION,
};
pub use state_store::StateStore;

#[cfg(test)]
mod tests;
