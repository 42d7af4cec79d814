//! Dataset orchestration: staged uploads, validation, metadata and content
//! persistence, and the read/delete side of the dataset API.

use super::format::{validate_format, DatasetFormat};
use super::limits::stream_with_size_limit;
use super::DatasetError;
use crate::catalog::{CatalogManager, DatasetInfo, SqliteCatalogManager};
use crate::config::AppConfig;
use crate::http::models::{DatasetDownloadResponse, DatasetResponse, ListingResponse};
use crate::storage::{storage_from_config, StorageManager};
use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Settings the dataset service needs, resolved from configuration.
#[derive(Debug, Clone)]
pub struct DatasetSettings {
    /// Largest accepted upload in bytes.
    pub max_dataset_size: u64,
    /// Object key prefix under which dataset content is stored.
    pub prefix: String,
    /// Lifetime of presigned download URLs.
    pub url_expiration: Duration,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            max_dataset_size: 50_000_000,
            prefix: "datasets".to_string(),
            url_expiration: Duration::from_secs(3600),
        }
    }
}

/// An upload written to a private temporary file and size-checked.
///
/// The temporary file is removed when this value is dropped.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    size: u64,
}

impl StagedUpload {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[derive(Debug)]
pub struct DatasetService {
    catalog: Arc<dyn CatalogManager>,
    storage: Arc<dyn StorageManager>,
    settings: DatasetSettings,
}

impl DatasetService {
    pub fn new(
        catalog: Arc<dyn CatalogManager>,
        storage: Arc<dyn StorageManager>,
        settings: DatasetSettings,
    ) -> Self {
        Self {
            catalog,
            storage,
            settings,
        }
    }

    /// Open the SQLite catalog, apply pending migrations and build the
    /// configured storage backend.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let catalog = SqliteCatalogManager::new(&config.catalog.path).await?;
        catalog.run_migrations().await?;
        let storage = storage_from_config(&config.storage)?;

        info!(
            catalog = %config.catalog.path,
            storage = %config.storage.storage_type,
            "Dataset service initialized"
        );

        Ok(Self::new(
            Arc::new(catalog),
            storage,
            config.dataset_settings(),
        ))
    }

    /// Close the catalog connection.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.catalog.close().await
    }

    pub fn settings(&self) -> &DatasetSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogManager> {
        &self.catalog
    }

    pub fn storage(&self) -> &Arc<dyn StorageManager> {
        &self.storage
    }

    /// Object key of a dataset's content. The original filename is kept so
    /// downloads come back under the same name.
    pub fn storage_key(&self, dataset_id: &str, filename: &str) -> String {
        format!("{}/{}/{}", self.settings.prefix, dataset_id, filename)
    }

    /// Write `source` to a temporary file, enforcing the size limit.
    #[tracing::instrument(
        name = "dataset_stage_upload",
        skip(self, source),
        fields(evalhub.size_bytes = tracing::field::Empty)
    )]
    pub async fn stage_upload<S, E>(&self, source: S) -> Result<StagedUpload, DatasetError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<anyhow::Error>,
    {
        let file = NamedTempFile::new().map_err(|e| DatasetError::Internal(e.into()))?;
        let handle = file.reopen().map_err(|e| DatasetError::Internal(e.into()))?;
        let mut writer = tokio::fs::File::from_std(handle);

        let size =
            stream_with_size_limit(source, &mut writer, self.settings.max_dataset_size).await?;
        drop(writer);

        tracing::Span::current().record("evalhub.size_bytes", size);
        Ok(StagedUpload { file, size })
    }

    /// Validate a staged upload and persist it as a new dataset.
    ///
    /// The record is written before the content. If storing the content fails
    /// the record is deleted again so no record points at missing content.
    #[tracing::instrument(
        name = "dataset_commit_upload",
        skip(self, staged),
        fields(evalhub.dataset_id = tracing::field::Empty)
    )]
    pub async fn commit_upload(
        &self,
        staged: StagedUpload,
        filename: &str,
        format: DatasetFormat,
    ) -> Result<DatasetResponse, DatasetError> {
        let filename = sanitize_filename(filename)?;

        let path = staged.path().to_path_buf();
        tokio::task::spawn_blocking(move || validate_format(&path, format))
            .await
            .map_err(|e| DatasetError::Internal(e.into()))??;

        let record = DatasetInfo {
            id: crate::id::generate_dataset_id(),
            filename,
            format: format.to_string(),
            size: staged.size as i64,
            created_at: Utc::now(),
        };
        tracing::Span::current().record("evalhub.dataset_id", &record.id);

        self.catalog
            .create_dataset(&record)
            .await
            .map_err(DatasetError::Catalog)?;

        let key = self.storage_key(&record.id, &record.filename);
        if let Err(e) = self.store_content(&key, staged.path()).await {
            warn!(
                dataset_id = %record.id,
                key = %key,
                error = %e,
                "Failed to store dataset content; rolling back record"
            );
            if let Err(rollback) = self.catalog.delete_dataset(&record.id).await {
                warn!(
                    dataset_id = %record.id,
                    error = %rollback,
                    "Failed to roll back dataset record; it may be orphaned"
                );
            }
            return Err(DatasetError::Storage(e));
        }

        info!(
            dataset_id = %record.id,
            size = record.size,
            format = %record.format,
            "Dataset uploaded"
        );

        Ok(record.into())
    }

    /// Stage, validate and persist an upload in one call.
    pub async fn upload_dataset<S, E>(
        &self,
        source: S,
        filename: &str,
        format: DatasetFormat,
    ) -> Result<DatasetResponse, DatasetError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<anyhow::Error>,
    {
        let staged = self.stage_upload(source).await?;
        self.commit_upload(staged, filename, format).await
    }

    async fn store_content(&self, key: &str, path: &Path) -> anyhow::Result<()> {
        self.storage.write_file(key, path).await
    }

    async fn get_dataset_record(&self, id: &str) -> Result<DatasetInfo, DatasetError> {
        self.catalog
            .get_dataset(id)
            .await
            .map_err(DatasetError::Catalog)?
            .ok_or_else(|| DatasetError::dataset_not_found(id))
    }

    pub async fn get_dataset(&self, id: &str) -> Result<DatasetResponse, DatasetError> {
        Ok(self.get_dataset_record(id).await?.into())
    }

    /// Fully qualified storage URL of a dataset's content.
    pub async fn get_dataset_path(&self, id: &str) -> Result<String, DatasetError> {
        let record = self.get_dataset_record(id).await?;
        Ok(self
            .storage
            .url(&self.storage_key(&record.id, &record.filename)))
    }

    pub async fn list_datasets(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<ListingResponse<DatasetResponse>, DatasetError> {
        let total = self
            .catalog
            .count_datasets()
            .await
            .map_err(DatasetError::Catalog)?;
        let records = self
            .catalog
            .list_datasets(skip, limit)
            .await
            .map_err(DatasetError::Catalog)?;

        Ok(ListingResponse {
            total: total.max(0) as u64,
            items: records.into_iter().map(Into::into).collect(),
        })
    }

    /// Delete a dataset's content and then its record.
    ///
    /// If the content cannot be removed the record is kept.
    #[tracing::instrument(name = "dataset_delete", skip(self), fields(evalhub.dataset_id = %id))]
    pub async fn delete_dataset(&self, id: &str) -> Result<(), DatasetError> {
        let record = self.get_dataset_record(id).await?;
        let key = self.storage_key(&record.id, &record.filename);

        self.storage
            .delete_prefix(&key)
            .await
            .map_err(DatasetError::Storage)?;

        self.catalog
            .delete_dataset(&record.id)
            .await
            .map_err(DatasetError::Catalog)?;

        info!(dataset_id = %id, "Dataset deleted");
        Ok(())
    }

    /// Presigned download URLs for every object stored for a dataset.
    pub async fn get_dataset_download(
        &self,
        id: &str,
    ) -> Result<DatasetDownloadResponse, DatasetError> {
        let record = self.get_dataset_record(id).await?;
        let key = self.storage_key(&record.id, &record.filename);

        let keys = self
            .storage
            .list(&key)
            .await
            .map_err(DatasetError::Storage)?;
        if keys.is_empty() {
            return Err(DatasetError::NotFound(format!(
                "No files found with prefix '{}'.",
                key
            )));
        }

        let mut download_urls = Vec::with_capacity(keys.len());
        for object_key in &keys {
            let url = self
                .storage
                .presigned_get_url(object_key, self.settings.url_expiration)
                .await
                .map_err(DatasetError::Storage)?;
            download_urls.push(url);
        }

        Ok(DatasetDownloadResponse {
            id: record.id,
            download_urls,
        })
    }
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(filename: &str) -> Result<String, DatasetError> {
    let name = filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(DatasetError::InvalidFilename(filename.to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MockCatalog;
    use crate::storage::FilesystemStorage;
    use futures::stream;
    use std::convert::Infallible;
    use tempfile::TempDir;

    fn body(content: &'static [u8]) -> impl Stream<Item = Result<Bytes, Infallible>> {
        stream::iter(
            content
                .chunks(4)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        )
    }

    fn create_service(max: u64) -> (DatasetService, Arc<MockCatalog>, TempDir) {
        let temp = TempDir::new().unwrap();
        let catalog = Arc::new(MockCatalog::new());
        let storage = Arc::new(FilesystemStorage::new(temp.path().to_str().unwrap()));
        let settings = DatasetSettings {
            max_dataset_size: max,
            ..Default::default()
        };
        (
            DatasetService::new(catalog.clone(), storage, settings),
            catalog,
            temp,
        )
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("data.csv").unwrap(), "data.csv");
        assert_eq!(sanitize_filename("../../etc/data.csv").unwrap(), "data.csv");
        assert_eq!(sanitize_filename("C:\\tmp\\data.csv").unwrap(), "data.csv");
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename("..").is_err());
    }

    #[tokio::test]
    async fn test_staged_upload_is_removed_on_drop() {
        let (service, _catalog, _temp) = create_service(1_000);
        let staged = service
            .stage_upload(body(b"examples\nhello\n"))
            .await
            .unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(staged.size(), 15);
        assert_eq!(std::fs::read(&path).unwrap(), b"examples\nhello\n");

        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_upload_stores_content_under_key() {
        let (service, catalog, _temp) = create_service(1_000);
        let dataset = service
            .upload_dataset(
                body(b"examples,ground_truth\nq,a\n"),
                "experiment.csv",
                DatasetFormat::Experiment,
            )
            .await
            .unwrap();

        assert_eq!(dataset.filename, "experiment.csv");
        assert_eq!(dataset.format, "experiment");
        assert_eq!(dataset.size, 26);
        assert_eq!(catalog.len(), 1);

        let key = service.storage_key(&dataset.id, "experiment.csv");
        assert_eq!(key, format!("datasets/{}/experiment.csv", dataset.id));
        assert_eq!(
            service.storage().read(&key).await.unwrap(),
            b"examples,ground_truth\nq,a\n"
        );
    }

    #[tokio::test]
    async fn test_too_large_upload_creates_nothing() {
        let (service, catalog, _temp) = create_service(8);
        let err = service
            .upload_dataset(
                body(b"examples\nmuch too long\n"),
                "big.csv",
                DatasetFormat::Experiment,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::PayloadTooLarge { limit: 8 }));
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_format_creates_nothing() {
        let (service, catalog, _temp) = create_service(1_000);
        let err = service
            .upload_dataset(body(b"question\nq\n"), "bad.csv", DatasetFormat::Experiment)
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::MissingFields { .. }));
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_failure_is_reported() {
        let (service, catalog, _temp) = create_service(1_000);
        catalog.set_fail_create(true);
        let err = service
            .upload_dataset(body(b"examples\nq\n"), "a.csv", DatasetFormat::Experiment)
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::Catalog(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_content_and_record() {
        let (service, catalog, _temp) = create_service(1_000);
        let dataset = service
            .upload_dataset(body(b"examples\nq\n"), "a.csv", DatasetFormat::Experiment)
            .await
            .unwrap();
        let key = service.storage_key(&dataset.id, "a.csv");

        service.delete_dataset(&dataset.id).await.unwrap();

        assert!(catalog.is_empty());
        assert!(!service.storage().exists(&key).await.unwrap());
        assert!(service
            .delete_dataset(&dataset.id)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_download_and_path() {
        let (service, _catalog, temp) = create_service(1_000);
        let dataset = service
            .upload_dataset(body(b"examples\nq\n"), "a.csv", DatasetFormat::Experiment)
            .await
            .unwrap();

        let download = service.get_dataset_download(&dataset.id).await.unwrap();
        assert_eq!(download.id, dataset.id);
        assert_eq!(download.download_urls.len(), 1);
        assert!(download.download_urls[0].ends_with(&format!("{}/a.csv", dataset.id)));

        let path = service.get_dataset_path(&dataset.id).await.unwrap();
        assert!(path.starts_with("file://"));
        assert!(path.contains(temp.path().to_str().unwrap()));
    }

    #[tokio::test]
    async fn test_download_without_content_is_not_found() {
        let (service, _catalog, _temp) = create_service(1_000);
        let dataset = service
            .upload_dataset(body(b"examples\nq\n"), "a.csv", DatasetFormat::Experiment)
            .await
            .unwrap();
        let key = service.storage_key(&dataset.id, "a.csv");
        service.storage().delete(&key).await.unwrap();

        let err = service.get_dataset_download(&dataset.id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains(&key));
    }
}
