//! Builds locator lists by scanning a local directory.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Collects the files under `dir` whose extension matches `extensions`
/// (case-insensitive; an empty list accepts every file), optionally
/// recursing into subdirectories. Symlinks and non-files are skipped, and
/// the result is sorted so pipeline passes see a stable locator order.
pub fn discover_locators(
    dir: impl AsRef<Path>,
    extensions: &[&str],
    recurse: bool,
) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    let metadata = fs::metadata(dir)
        .with_context(|| format!("failed to access directory: {}", dir.display()))?;
    if !metadata.is_dir() {
        bail!("path is not a directory: {}", dir.display());
    }

    let extensions: Vec<String> = extensions.iter().map(|e| e.to_lowercase()).collect();

    let paths: Vec<PathBuf> = if recurse {
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir) {
            let entry = entry.with_context(|| {
                format!("failed to read directory entry under: {}", dir.display())
            })?;
            paths.push(entry.into_path());
        }
        paths
    } else {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("failed to read directory: {}", dir.display()))?
        {
            let entry =
                entry.with_context(|| format!("failed to read entry in: {}", dir.display()))?;
            paths.push(entry.path());
        }
        paths
    };

    let mut locators = Vec::new();
    for path in paths {
        if path.is_symlink() || !path.is_file() {
            continue;
        }
        let extension_matches = extensions.is_empty()
            || path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| extensions.contains(&e.to_lowercase()));
        if extension_matches {
            locators.push(path.to_string_lossy().into_owned());
        }
    }
    locators.sort();
    Ok(locators)
}
