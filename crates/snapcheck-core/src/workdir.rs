//! Filesystem helpers for the pipeline's working directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::domain::{CoreError, Result};

/// Remove `dir` if it exists and recreate it empty.
pub fn reset_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(CoreError::io(dir, e)),
    }
    fs::create_dir_all(dir).map_err(|e| CoreError::io(dir, e))
}

/// Absolute form of `path` for containment checks.
///
/// `.` and `..` are resolved lexically, then the longest existing prefix is
/// canonicalized (following symlinks) and the rest is appended as written.
pub fn resolve_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }

    let mut missing = Vec::new();
    let mut existing = normalized.as_path();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Recursively copy the contents of `src` into `dest`, creating `dest`.
///
/// Returns the number of files copied.
pub fn copy_dir_all(src: &Path, dest: &Path) -> Result<usize> {
    fs::create_dir_all(dest).map_err(|e| CoreError::io(dest, e))?;
    let mut copied = 0;
    for entry in fs::read_dir(src).map_err(|e| CoreError::io(src, e))? {
        let entry = entry.map_err(|e| CoreError::io(src, e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| CoreError::io(&from, e))?;
        if file_type.is_dir() {
            copied += copy_dir_all(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| CoreError::io(&from, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}
