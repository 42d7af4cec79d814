//! Mock catalog implementation for testing.
//!
//! Provides a configurable in-memory implementation of `CatalogManager` that can be used
//! in tests to avoid needing a real database.

use super::{CatalogManager, DatasetInfo};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Mock catalog that can be configured to fail for testing error handling.
#[derive(Debug)]
pub struct MockCatalog {
    datasets: Mutex<BTreeMap<String, DatasetInfo>>,
    fail_create: AtomicBool,
    fail_delete: AtomicBool,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self {
            datasets: Mutex::new(BTreeMap::new()),
            fail_create: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    /// Configure whether create operations should fail.
    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Configure whether delete operations should fail.
    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Number of dataset records currently held.
    pub fn len(&self) -> usize {
        self.datasets.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogManager for MockCatalog {
    async fn run_migrations(&self) -> Result<()> {
        Ok(())
    }

    async fn create_dataset(&self, dataset: &DatasetInfo) -> Result<()> {
        if self.fail_create.load(Ordering::SeqCst) {
            anyhow::bail!("Mock create failure");
        }
        let mut datasets = self.datasets.lock().unwrap();
        if datasets.contains_key(&dataset.id) {
            anyhow::bail!("Dataset '{}' already exists", dataset.id);
        }
        datasets.insert(dataset.id.clone(), dataset.clone());
        Ok(())
    }

    async fn get_dataset(&self, id: &str) -> Result<Option<DatasetInfo>> {
        Ok(self.datasets.lock().unwrap().get(id).cloned())
    }

    async fn list_datasets(&self, skip: usize, limit: usize) -> Result<Vec<DatasetInfo>> {
        let mut all: Vec<DatasetInfo> = self.datasets.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(all.into_iter().skip(skip).take(limit).collect())
    }

    async fn count_datasets(&self) -> Result<i64> {
        Ok(self.datasets.lock().unwrap().len() as i64)
    }

    async fn delete_dataset(&self, id: &str) -> Result<bool> {
        if self.fail_delete.load(Ordering::SeqCst) {
            anyhow::bail!("Mock delete failure");
        }
        Ok(self.datasets.lock().unwrap().remove(id).is_some())
    }
}
