use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt::Debug;

/// Metadata row for an uploaded dataset.
///
/// The content itself lives in object storage under
/// `{prefix}/{id}/{filename}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DatasetInfo {
    pub id: String,
    pub filename: String,
    pub format: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

/// Async interface for catalog operations.
#[async_trait]
pub trait CatalogManager: Debug + Send + Sync {
    /// Close the catalog connection. This is idempotent and can be called multiple times.
    async fn close(&self) -> Result<()> {
        // Default implementation does nothing - sqlx pools handle cleanup automatically
        Ok(())
    }

    /// Apply any pending schema migrations. Should be idempotent.
    async fn run_migrations(&self) -> Result<()>;

    /// Insert a new dataset record.
    async fn create_dataset(&self, dataset: &DatasetInfo) -> Result<()>;

    async fn get_dataset(&self, id: &str) -> Result<Option<DatasetInfo>>;

    /// List datasets ordered by creation time, oldest first.
    async fn list_datasets(&self, skip: usize, limit: usize) -> Result<Vec<DatasetInfo>>;

    async fn count_datasets(&self) -> Result<i64>;

    /// Delete a dataset record. Returns true if it existed.
    async fn delete_dataset(&self, id: &str) -> Result<bool>;
}
