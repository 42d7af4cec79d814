// src/storage/s3.rs
use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::buffered::BufWriter;
use object_store::signer::Signer;
use object_store::{path::Path as ObjectPath, ObjectStore};
use percent_encoding::percent_decode_str;
use reqwest::Method;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::StorageManager;

#[derive(Debug)]
pub struct S3Storage {
    bucket: String,
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
}

impl S3Storage {
    pub fn new(bucket: &str) -> Result<Self> {
        let s3 = Arc::new(
            AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .build()?,
        );

        Ok(Self {
            bucket: bucket.to_string(),
            store: s3.clone(),
            signer: Some(s3),
        })
    }

    /// Create S3Storage with custom endpoint for MinIO/S3-compatible storage
    pub fn new_with_config(
        bucket: &str,
        region: Option<&str>,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        allow_http: bool,
    ) -> Result<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(bucket)
            .with_endpoint(endpoint)
            .with_access_key_id(access_key)
            .with_secret_access_key(secret_key)
            .with_allow_http(allow_http);

        if let Some(region) = region {
            builder = builder.with_region(region);
        }

        // For MinIO, we need to use path-style URLs
        builder = builder.with_virtual_hosted_style_request(false);

        let s3 = Arc::new(builder.build()?);

        Ok(Self {
            bucket: bucket.to_string(),
            store: s3.clone(),
            signer: Some(s3),
        })
    }

    /// Wrap an arbitrary object store, e.g. `InMemory` in tests. Such stores
    /// cannot presign, so download URLs fall back to `s3://` URLs.
    pub fn with_store(bucket: &str, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            bucket: bucket.to_string(),
            store,
            signer: None,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_path(key: &str) -> ObjectPath {
        ObjectPath::from(key.trim_start_matches('/'))
    }

    /// Inverse of [`Self::object_path`]: object_store percent-encodes reserved
    /// characters in each part, storage keys carry them raw.
    fn key_for(location: &ObjectPath) -> Result<String> {
        let parts = location
            .parts()
            .map(|part| {
                percent_decode_str(part.as_ref())
                    .decode_utf8()
                    .map(|decoded| decoded.into_owned())
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(parts.join("/"))
    }

    /// Locations of every object under `prefix`, or of the object named by
    /// `prefix` itself.
    async fn list_locations(&self, prefix: &str) -> Result<Vec<ObjectPath>> {
        let prefix_path = Self::object_path(prefix);
        let mut locations: Vec<ObjectPath> = self
            .store
            .list(Some(&prefix_path))
            .map_ok(|meta| meta.location)
            .try_collect()
            .await?;

        // A prefix naming an object exactly is not listed as its own child.
        if locations.is_empty() && self.exists(prefix).await? {
            locations.push(prefix_path);
        }

        Ok(locations)
    }
}

#[async_trait]
impl StorageManager for S3Storage {
    fn url(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key.trim_start_matches('/'))
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        let result = self.store.get(&Self::object_path(key)).await?;
        let bytes = result.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        self.store
            .put(&Self::object_path(key), data.to_vec().into())
            .await?;
        Ok(())
    }

    async fn write_file(&self, key: &str, path: &Path) -> Result<()> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut writer = BufWriter::new(self.store.clone(), Self::object_path(key));

        let copied = match tokio::io::copy(&mut file, &mut writer).await {
            Ok(_) => writer.shutdown().await,
            Err(e) => Err(e),
        };
        if let Err(e) = copied {
            if let Err(abort) = writer.abort().await {
                warn!(key, error = %abort, "Failed to abort partial upload");
            }
            return Err(e.into());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(&Self::object_path(key)).await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        for location in self.list_locations(prefix).await? {
            self.store.delete(&location).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self.store.head(&Self::object_path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = self
            .list_locations(prefix)
            .await?
            .iter()
            .map(Self::key_for)
            .collect::<Result<Vec<_>>>()?;
        keys.sort();
        Ok(keys)
    }

    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> Result<String> {
        match &self.signer {
            Some(signer) => {
                let url = signer
                    .signed_url(Method::GET, &Self::object_path(key), expires_in)
                    .await?;
                Ok(url.to_string())
            }
            None => {
                debug!(key, "Object store cannot presign; returning plain URL");
                Ok(self.url(key))
            }
        }
    }
}
