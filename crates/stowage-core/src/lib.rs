mod descriptor;
mod error;
mod fingerprint;
mod key;
mod manifest;
mod mode;

pub use descriptor::{
    parse_persisted_root, with_trailing_separator, PackageDescriptor, DIRECTORY_CLASSES,
    DIRECTORY_CONFIGURATION, DIRECTORY_DOCUMENTATION, DIRECTORY_METADATA, DIRECTORY_RESOURCES,
    DIRECTORY_TESTS_FUNCTIONAL, DIRECTORY_TESTS_UNIT, SKELETON_DIRECTORIES,
};
pub use error::{PackageError, PackageResult};
pub use fingerprint::{fingerprint_directory, sha256_hex};
pub use key::{
    is_valid_package_key, lookup_form, validate_key_reference, PackageKey, PACKAGE_KEY_SEPARATOR,
};
pub use manifest::{
    ManifestError, PackageManifest, COLLECTION_PACKAGE_TYPE, DEFAULT_PACKAGE_TYPE,
    MANIFEST_FILE_NAME,
};
pub use mode::RuntimeMode;
