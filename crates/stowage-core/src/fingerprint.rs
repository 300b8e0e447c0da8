use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Digest over every file below `root`: relative path plus content hash,
/// in sorted path order. Hidden entries are part of the digest.
pub fn fingerprint_directory(root: &Path) -> io::Result<String> {
    let mut file_paths = collect_relative_file_paths(root)?;
    file_paths.sort();

    let mut hasher = Sha256::new();
    for relative_path in file_paths {
        let bytes = fs::read(root.join(&relative_path))?;
        hasher.update(normalize_relative_path(&relative_path).as_bytes());
        hasher.update([0]);
        hasher.update(sha256_hex(&bytes).as_bytes());
        hasher.update([0]);
    }

    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn collect_relative_file_paths(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                if let Ok(relative) = path.strip_prefix(root) {
                    paths.push(relative.to_path_buf());
                }
            }
        }
    }

    Ok(paths)
}

fn normalize_relative_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
