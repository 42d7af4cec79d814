use crate::catalog::manager::{CatalogManager, DatasetInfo};
use crate::catalog::migrations::{run_migrations, CatalogMigrations};
use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::SqlitePool;
use std::fmt::{self, Debug, Formatter};

pub struct SqliteCatalogManager {
    pool: SqlitePool,
    catalog_path: String,
}

impl Debug for SqliteCatalogManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteCatalogManager")
            .field("catalog_path", &self.catalog_path)
            .finish()
    }
}

struct SqliteMigrationBackend;

impl SqliteCatalogManager {
    pub async fn new(db_path: &str) -> Result<Self> {
        let uri = format!("sqlite:{}?mode=rwc", db_path);
        let pool = SqlitePool::connect(&uri).await?;

        Ok(Self {
            pool,
            catalog_path: db_path.to_string(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl CatalogManager for SqliteCatalogManager {
    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    async fn run_migrations(&self) -> Result<()> {
        run_migrations::<SqliteMigrationBackend>(&self.pool).await
    }

    #[tracing::instrument(
        name = "catalog_create_dataset",
        skip(self, dataset),
        fields(evalhub.dataset_id = %dataset.id)
    )]
    async fn create_dataset(&self, dataset: &DatasetInfo) -> Result<()> {
        sqlx::query(
            "INSERT INTO datasets (id, filename, format, size, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&dataset.id)
        .bind(&dataset.filename)
        .bind(&dataset.format)
        .bind(dataset.size)
        .bind(dataset.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_dataset(&self, id: &str) -> Result<Option<DatasetInfo>> {
        sqlx::query_as::<_, DatasetInfo>(
            "SELECT id, filename, format, size, created_at FROM datasets WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn list_datasets(&self, skip: usize, limit: usize) -> Result<Vec<DatasetInfo>> {
        sqlx::query_as::<_, DatasetInfo>(
            "SELECT id, filename, format, size, created_at FROM datasets \
             ORDER BY created_at, id LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn count_datasets(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM datasets")
            .fetch_one(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn delete_dataset(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM datasets WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl CatalogMigrations for SqliteMigrationBackend {
    type Pool = SqlitePool;

    fn ensure_migrations_table(pool: &Self::Pool) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS schema_migrations (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
                )
                "#,
            )
            .execute(pool)
            .await?;
            Ok(())
        })
    }

    fn current_version(pool: &Self::Pool) -> BoxFuture<'_, Result<i64>> {
        Box::pin(async move {
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(pool)
                .await
                .map_err(Into::into)
        })
    }

    fn record_version(pool: &Self::Pool, version: i64) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            sqlx::query("INSERT INTO schema_migrations (version) VALUES (?)")
                .bind(version)
                .execute(pool)
                .await?;
            Ok(())
        })
    }

    fn migrate_v1(pool: &Self::Pool) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS datasets (
                    id TEXT PRIMARY KEY,
                    filename TEXT NOT NULL,
                    format TEXT NOT NULL,
                    size INTEGER NOT NULL,
                    created_at TEXT NOT NULL
                )
                "#,
            )
            .execute(pool)
            .await?;
            Ok(())
        })
    }

    fn migrate_v2(pool: &Self::Pool) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            sqlx::query(
                "CREATE INDEX IF NOT EXISTS idx_datasets_created_at ON datasets (created_at, id)",
            )
            .execute(pool)
            .await?;
            Ok(())
        })
    }
}
