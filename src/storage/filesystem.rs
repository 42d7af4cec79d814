// src/storage/filesystem.rs
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::StorageManager;

#[derive(Debug)]
pub struct FilesystemStorage {
    base: PathBuf,
}

impl FilesystemStorage {
    pub fn new(base: &str) -> Self {
        Self {
            base: PathBuf::from(base),
        }
    }

    fn path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            anyhow::bail!("Invalid storage key: {}", key);
        }
        Ok(self.base.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

#[async_trait]
impl StorageManager for FilesystemStorage {
    fn url(&self, key: &str) -> String {
        let path = self.base.join(key.trim_start_matches('/'));
        format!("file://{}", path.display())
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.path(key)?).await?)
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.path(key)?;

        // Create parent directories
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::write(path, data).await?;
        Ok(())
    }

    async fn write_file(&self, key: &str, source: &Path) -> Result<()> {
        let path = self.path(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::copy(source, path).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path(key)?;

        if fs::try_exists(&path).await? {
            if path.is_dir() {
                fs::remove_dir_all(&path).await?;
            } else {
                fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        // Object keys have no real directories; a prefix may name a file too.
        self.delete(prefix).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(fs::try_exists(self.path(key)?).await?)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let root = self.path(prefix)?;
        if !fs::try_exists(&root).await? {
            return Ok(vec![]);
        }

        let mut keys = Vec::new();
        let mut pending = vec![root];
        while let Some(path) = pending.pop() {
            if path.is_dir() {
                let mut entries = fs::read_dir(&path).await?;
                while let Some(entry) = entries.next_entry().await? {
                    pending.push(entry.path());
                }
            } else if let Some(key) = self.key_for(&path) {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }
}
