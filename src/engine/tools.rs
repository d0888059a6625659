//! Path utilities

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Convert absolute path to relative path from base
pub fn path_relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(|p| p.to_path_buf())
}

/// Virtual key for a relative path: components joined with `/` on every platform.
/// `None` when the path is not valid UTF-8; a lossy key could collide with another file's.
pub fn path_to_key(rel: &Path) -> Option<String> {
    rel.to_str().map(|s| s.replace('\\', "/"))
}

/// Virtual key for `abs` under `root`. `None` if `abs` is not under `root`, is `root` itself,
/// or its relative path is not valid UTF-8.
pub fn virtual_key(abs: &Path, root: &Path) -> Option<String> {
    path_relative_to(abs, root)
        .filter(|rel| !rel.as_os_str().is_empty())
        .and_then(|rel| path_to_key(&rel))
}

/// Canonicalize the root and make sure it is a directory.
pub fn check_root_and_canonicalize(path: &Path) -> Result<PathBuf> {
    let root = path
        .canonicalize()
        .with_context(|| format!("canonicalize root {}", path.display()))?;
    if !root.is_dir() {
        anyhow::bail!("root is not a directory: {}", root.display());
    }
    Ok(root)
}

/// Canonical form of an output path that may not exist yet: canonical parent + file name.
/// `None` when the parent does not exist either.
pub fn canonicalize_output(out: &Path) -> Option<PathBuf> {
    if let Ok(p) = out.canonicalize() {
        return Some(p);
    }
    let name = out.file_name()?;
    let parent = match out.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    parent.canonicalize().ok().map(|p| p.join(name))
}
