use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use stowage_core::{PackageError, PackageResult};

/// Writes text using a temp file + rename so readers never observe partial data.
pub(crate) fn write_text_atomic(path: &Path, content: &str) -> PackageResult<()> {
    if path.is_dir() {
        return Err(PackageError::invalid_path(
            path,
            "state file destination is a directory",
        ));
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir)
        .map_err(|err| PackageError::io("failed creating state directory", parent_dir, err))?;

    let temp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("package-states"),
        std::process::id(),
        unique_suffix()
    );
    let temp_path = parent_dir.join(temp_name);
    fs::write(&temp_path, content)
        .map_err(|err| PackageError::io("failed writing temporary state file", &temp_path, err))?;
    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(PackageError::io("failed replacing state file", path, err));
    }

    Ok(())
}

pub(crate) fn remove_package_dir(path: &Path) -> PackageResult<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_dir_all(path).map_err(|err| {
        PackageError::io(
            "failed removing package directory, check file permissions",
            path,
            err,
        )
    })
}

pub(crate) fn unique_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}
