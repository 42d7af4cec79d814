use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use evalhub::catalog::{CatalogManager, MockCatalog, SqliteCatalogManager};
use evalhub::config::AppConfig;
use evalhub::datasets::{DatasetError, DatasetFormat, DatasetService, DatasetSettings};
use evalhub::http::models::DatasetResponse;
use evalhub::storage::{FilesystemStorage, S3Storage, StorageManager};
use futures::stream;
use std::convert::Infallible;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const VALID_CSV: &str = "examples,ground_truth\n\"What is 2+2?\",4\n\"Capital of France?\",Paris\n";

/// Filesystem storage whose writes and deletes can be made to fail.
#[derive(Debug)]
struct FlakyStorage {
    inner: FilesystemStorage,
    fail_write: AtomicBool,
    fail_delete: AtomicBool,
}

impl FlakyStorage {
    fn new(base: &str) -> Self {
        Self {
            inner: FilesystemStorage::new(base),
            fail_write: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl StorageManager for FlakyStorage {
    fn url(&self, key: &str) -> String {
        self.inner.url(key)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, data: &[u8]) -> Result<()> {
        if self.fail_write.load(Ordering::SeqCst) {
            anyhow::bail!("simulated write failure");
        }
        self.inner.write(key, data).await
    }

    async fn write_file(&self, key: &str, path: &Path) -> Result<()> {
        if self.fail_write.load(Ordering::SeqCst) {
            anyhow::bail!("simulated write failure");
        }
        self.inner.write_file(key, path).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            anyhow::bail!("simulated delete failure");
        }
        self.inner.delete_prefix(prefix).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.inner.exists(key).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(prefix).await
    }
}

struct TestEnv {
    service: DatasetService,
    catalog: Arc<SqliteCatalogManager>,
    storage: Arc<FlakyStorage>,
    _dir: TempDir,
}

async fn create_test_service(max_dataset_size: u64) -> TestEnv {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("catalog.db");
    let catalog = Arc::new(
        SqliteCatalogManager::new(db_path.to_str().unwrap())
            .await
            .unwrap(),
    );
    catalog.run_migrations().await.unwrap();

    let storage_dir = dir.path().join("storage");
    let storage = Arc::new(FlakyStorage::new(storage_dir.to_str().unwrap()));

    let settings = DatasetSettings {
        max_dataset_size,
        ..DatasetSettings::default()
    };
    let service = DatasetService::new(catalog.clone(), storage.clone(), settings);

    TestEnv {
        service,
        catalog,
        storage,
        _dir: dir,
    }
}

fn body(content: &str) -> impl futures::Stream<Item = Result<Bytes, Infallible>> {
    let chunks: Vec<Result<Bytes, Infallible>> = content
        .as_bytes()
        .chunks(7)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    stream::iter(chunks)
}

async fn upload(env: &TestEnv, filename: &str) -> Result<DatasetResponse, DatasetError> {
    env.service
        .upload_dataset(body(VALID_CSV), filename, DatasetFormat::Experiment)
        .await
}

#[tokio::test]
async fn test_upload_persists_record_and_content() {
    let env = create_test_service(50_000_000).await;

    let dataset = upload(&env, "questions.csv").await.unwrap();

    assert!(dataset.id.starts_with("dset"));
    assert_eq!(dataset.filename, "questions.csv");
    assert_eq!(dataset.format, "experiment");
    assert_eq!(dataset.size, VALID_CSV.len() as u64);

    let record = env.catalog.get_dataset(&dataset.id).await.unwrap().unwrap();
    assert_eq!(record.size, VALID_CSV.len() as i64);

    let key = env.service.storage_key(&dataset.id, "questions.csv");
    assert_eq!(key, format!("datasets/{}/questions.csv", dataset.id));
    assert_eq!(env.storage.read(&key).await.unwrap(), VALID_CSV.as_bytes());

    let fetched = env.service.get_dataset(&dataset.id).await.unwrap();
    assert_eq!(fetched.id, dataset.id);
    assert_eq!(fetched.filename, dataset.filename);
    assert_eq!(fetched.size, dataset.size);
}

#[tokio::test]
async fn test_upload_keeps_only_final_filename_component() {
    let env = create_test_service(50_000_000).await;

    let dataset = upload(&env, "C:\\Users\\me\\evals/questions.csv").await.unwrap();

    assert_eq!(dataset.filename, "questions.csv");
}

#[tokio::test]
async fn test_oversized_upload_leaves_no_trace() {
    let env = create_test_service(10).await;

    let err = upload(&env, "questions.csv").await.unwrap_err();

    assert!(matches!(err, DatasetError::PayloadTooLarge { limit: 10 }));
    assert_eq!(err.to_string(), "File upload exceeds the 10B limit.");
    assert_eq!(env.catalog.count_datasets().await.unwrap(), 0);
    assert!(env.storage.list("datasets").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_exactly_at_limit_is_accepted() {
    let env = create_test_service(VALID_CSV.len() as u64).await;

    let dataset = upload(&env, "questions.csv").await.unwrap();

    assert_eq!(dataset.size, VALID_CSV.len() as u64);
}

#[tokio::test]
async fn test_storage_failure_rolls_back_record() {
    let env = create_test_service(50_000_000).await;
    env.storage.fail_write.store(true, Ordering::SeqCst);

    let err = upload(&env, "questions.csv").await.unwrap_err();

    assert!(matches!(err, DatasetError::Storage(_)));
    assert_eq!(env.catalog.count_datasets().await.unwrap(), 0);
}

#[tokio::test]
async fn test_schema_violations_are_reported_per_field() {
    let env = create_test_service(50_000_000).await;

    let err = env
        .service
        .upload_dataset(
            body("ground_truth\n4\n"),
            "questions.csv",
            DatasetFormat::Experiment,
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "experiment dataset is missing the required fields: examples."
    );

    let err = env
        .service
        .upload_dataset(
            body("examples,predictions,score\nq,a,1\n"),
            "questions.csv",
            DatasetFormat::Experiment,
        )
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "experiment dataset contains the invalid fields: predictions, score. \
         Only examples, ground_truth are allowed."
    );

    assert_eq!(env.catalog.count_datasets().await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_datasets_reports_total_and_pages() {
    let env = create_test_service(50_000_000).await;
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(upload(&env, &format!("set-{}.csv", i)).await.unwrap().id);
    }

    let all = env.service.list_datasets(0, 100).await.unwrap();
    assert_eq!(all.total, 5);
    assert_eq!(all.items.len(), 5);
    assert!(all.items.iter().all(|d| ids.contains(&d.id)));

    let page = env.service.list_datasets(3, 10).await.unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.items.len(), 2);

    let empty = env.service.list_datasets(10, 10).await.unwrap();
    assert_eq!(empty.total, 5);
    assert!(empty.items.is_empty());
}

#[tokio::test]
async fn test_delete_keeps_record_when_content_removal_fails() {
    let env = create_test_service(50_000_000).await;
    let dataset = upload(&env, "questions.csv").await.unwrap();

    env.storage.fail_delete.store(true, Ordering::SeqCst);
    let err = env.service.delete_dataset(&dataset.id).await.unwrap_err();
    assert!(matches!(err, DatasetError::Storage(_)));
    assert!(env.service.get_dataset(&dataset.id).await.is_ok());

    env.storage.fail_delete.store(false, Ordering::SeqCst);
    env.service.delete_dataset(&dataset.id).await.unwrap();
    assert!(env.service.get_dataset(&dataset.id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_download_and_path_point_at_content() {
    let env = create_test_service(50_000_000).await;
    let dataset = upload(&env, "questions.csv").await.unwrap();

    let download = env.service.get_dataset_download(&dataset.id).await.unwrap();
    assert_eq!(download.id, dataset.id);
    assert_eq!(download.download_urls.len(), 1);
    assert!(download.download_urls[0].ends_with(&format!("{}/questions.csv", dataset.id)));

    let path = env.service.get_dataset_path(&dataset.id).await.unwrap();
    assert!(path.starts_with("file://"));
    assert_eq!(path, download.download_urls[0]);
}

#[tokio::test]
async fn test_unknown_dataset_is_not_found() {
    let env = create_test_service(50_000_000).await;

    let err = env.service.get_dataset("dset-missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Dataset 'dset-missing' not found.");

    assert!(env.service.delete_dataset("dset-missing").await.unwrap_err().is_not_found());
    assert!(env
        .service
        .get_dataset_download("dset-missing")
        .await
        .unwrap_err()
        .is_not_found());
}

#[tokio::test]
async fn test_service_from_config() {
    let dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    config.catalog.path = dir.path().join("catalog.db").to_string_lossy().to_string();
    config.storage.base_dir = Some(dir.path().join("data").to_string_lossy().to_string());
    config.datasets.prefix = "uploads".to_string();

    let service = DatasetService::from_config(&config).await.unwrap();
    let dataset = service
        .upload_dataset(body(VALID_CSV), "questions.csv", DatasetFormat::Experiment)
        .await
        .unwrap();

    let on_disk = dir
        .path()
        .join("data")
        .join("uploads")
        .join(&dataset.id)
        .join("questions.csv");
    assert_eq!(std::fs::read(on_disk).unwrap(), VALID_CSV.as_bytes());

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_object_store_keeps_reserved_filename_characters() {
    let catalog = Arc::new(MockCatalog::new());
    let storage = Arc::new(S3Storage::with_store(
        "evalhub-test",
        Arc::new(object_store::memory::InMemory::new()),
    ));
    let service = DatasetService::new(catalog.clone(), storage.clone(), DatasetSettings::default());

    let dataset = service
        .upload_dataset(body(VALID_CSV), "my data #1.csv", DatasetFormat::Experiment)
        .await
        .unwrap();
    assert_eq!(dataset.filename, "my data #1.csv");

    let key = service.storage_key(&dataset.id, "my data #1.csv");
    assert_eq!(storage.read(&key).await.unwrap(), VALID_CSV.as_bytes());
    assert_eq!(
        storage.list(&format!("datasets/{}", dataset.id)).await.unwrap(),
        vec![key.clone()]
    );

    let download = service.get_dataset_download(&dataset.id).await.unwrap();
    assert_eq!(
        download.download_urls,
        vec![format!("s3://evalhub-test/{}", key)]
    );
    assert!(download.download_urls[0].ends_with("/my data #1.csv"));

    service.delete_dataset(&dataset.id).await.unwrap();
    assert!(!storage.exists(&key).await.unwrap());
    assert!(storage.list("datasets").await.unwrap().is_empty());
    assert_eq!(catalog.count_datasets().await.unwrap(), 0);
}
