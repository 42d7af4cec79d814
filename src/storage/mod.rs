// src/storage/mod.rs
use anyhow::Result;
use async_trait::async_trait;
use crate::config::StorageConfig;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub mod filesystem;
pub mod s3;

// Re-exports
pub use filesystem::FilesystemStorage;
pub use s3::S3Storage;

/// Long-term content store addressed by slash-separated object keys.
#[async_trait]
pub trait StorageManager: Debug + Send + Sync {
    /// Fully qualified URL for a key (`file://...` or `s3://bucket/...`).
    fn url(&self, key: &str) -> String;

    // File operations
    async fn read(&self, key: &str) -> Result<Vec<u8>>;
    async fn write(&self, key: &str, data: &[u8]) -> Result<()>;
    /// Store the contents of a local file without buffering it in memory.
    async fn write_file(&self, key: &str, path: &Path) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn delete_prefix(&self, prefix: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Keys of every object stored under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// URL a client can GET the object from without credentials.
    ///
    /// Backends that cannot sign return the plain object URL.
    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        let _ = expires_in;
        Ok(self.url(key))
    }
}

/// Build the storage backend named by the `[storage]` config section.
pub fn storage_from_config(config: &StorageConfig) -> Result<Arc<dyn StorageManager>> {
    match config.storage_type.as_str() {
        "filesystem" => {
            let base = config.base_dir.as_deref().unwrap_or("data");
            Ok(Arc::new(FilesystemStorage::new(base)))
        }
        "s3" => {
            let bucket = config
                .bucket
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("S3 storage requires 'bucket'"))?;
            let storage = match (&config.endpoint, &config.access_key, &config.secret_key) {
                (Some(endpoint), Some(access_key), Some(secret_key)) => S3Storage::new_with_config(
                    bucket,
                    config.region.as_deref(),
                    endpoint,
                    access_key,
                    secret_key,
                    config.allow_http,
                )?,
                _ => S3Storage::new(bucket)?,
            };
            Ok(Arc::new(storage))
        }
        other => anyhow::bail!("Invalid storage type: {}", other),
    }
}
