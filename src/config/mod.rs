use crate::datasets::DatasetSettings;
use crate::jobs::PollSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub datasets: DatasetsConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// SQLite database file, created on first start.
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

fn default_catalog_path() -> String {
    "evalhub.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// "filesystem" or "s3"
    #[serde(rename = "type", default = "default_storage_type")]
    pub storage_type: String,
    pub bucket: Option<String>,
    pub region: Option<String>,
    /// S3-compatible endpoint; switches to path-style requests.
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
    /// Root directory for filesystem storage. Defaults to ./data
    pub base_dir: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: default_storage_type(),
            bucket: None,
            region: None,
            endpoint: None,
            access_key: None,
            secret_key: None,
            allow_http: false,
            base_dir: None,
        }
    }
}

fn default_storage_type() -> String {
    "filesystem".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetsConfig {
    /// Upload ceiling in bytes.
    #[serde(default = "default_max_dataset_size")]
    pub max_dataset_size: u64,
    /// Storage key prefix for dataset content.
    #[serde(default = "default_dataset_prefix")]
    pub prefix: String,
    /// Lifetime of presigned download URLs.
    #[serde(default = "default_url_expiration_secs")]
    pub url_expiration_secs: u64,
}

impl Default for DatasetsConfig {
    fn default() -> Self {
        Self {
            max_dataset_size: default_max_dataset_size(),
            prefix: default_dataset_prefix(),
            url_expiration_secs: default_url_expiration_secs(),
        }
    }
}

fn default_max_dataset_size() -> u64 {
    50_000_000
}

fn default_dataset_prefix() -> String {
    "datasets".to_string()
}

fn default_url_expiration_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobsConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_ray_dashboard_url")]
    pub ray_dashboard_url: String,
    /// Maximum number of status observations while waiting for a job.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_poll_wait_secs")]
    pub poll_wait_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ray_dashboard_url: default_ray_dashboard_url(),
            retries: default_retries(),
            poll_wait_secs: default_poll_wait_secs(),
        }
    }
}

fn default_api_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

fn default_ray_dashboard_url() -> String {
    "http://localhost:8265".to_string()
}

fn default_retries() -> u32 {
    30
}

fn default_poll_wait_secs() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load(config_path: &str) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::File::with_name(config_path));

        // Example: EVALHUB_SERVER__PORT=8080, EVALHUB_DATASETS__MAX_DATASET_SIZE=1000
        builder = builder.add_source(
            config::Environment::with_prefix("EVALHUB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        match self.storage.storage_type.as_str() {
            "s3" => {
                if self.storage.bucket.is_none() {
                    anyhow::bail!("S3 storage requires 'bucket'");
                }
            }
            "filesystem" => {}
            _ => anyhow::bail!("Invalid storage type: {}", self.storage.storage_type),
        }

        if self.datasets.max_dataset_size == 0 {
            anyhow::bail!("datasets.max_dataset_size must be greater than zero");
        }
        if self.jobs.retries == 0 {
            anyhow::bail!("jobs.retries must be at least 1");
        }

        Ok(())
    }

    pub fn dataset_settings(&self) -> DatasetSettings {
        DatasetSettings {
            max_dataset_size: self.datasets.max_dataset_size,
            prefix: self.datasets.prefix.clone(),
            url_expiration: Duration::from_secs(self.datasets.url_expiration_secs),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            max_attempts: self.jobs.retries,
            poll_interval: Duration::from_secs(self.jobs.poll_wait_secs),
        }
    }
}
