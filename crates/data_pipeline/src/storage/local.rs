use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use super::Storage;

/// Storage over the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorage;

impl LocalStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for LocalStorage {
    fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("failed to read file: {}", path))
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(Path::new(path).is_file())
    }

    fn file_size(&self, path: &str) -> Result<u64> {
        let metadata =
            fs::metadata(path).with_context(|| format!("failed to stat file: {}", path))?;
        if !metadata.is_file() {
            bail!("not a regular file: {}", path);
        }
        Ok(metadata.len())
    }

    fn read_text(&self, path: &str) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("failed to read text file: {}", path))
    }

    fn list_files(&self, dir: &str) -> Result<Vec<String>> {
        let entries =
            fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to read entry in: {}", dir))?;
            let path = entry.path();
            if path.is_file() {
                files.push(path.to_string_lossy().into_owned());
            }
        }
        files.sort();
        Ok(files)
    }
}
