use crate::catalog::DatasetInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Paged listing shared by every collection endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingResponse<T> {
    pub total: u64,
    pub items: Vec<T>,
}

/// Dataset metadata returned by the dataset endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetResponse {
    pub id: String,
    pub filename: String,
    pub format: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

impl From<DatasetInfo> for DatasetResponse {
    fn from(info: DatasetInfo) -> Self {
        Self {
            id: info.id,
            filename: info.filename,
            format: info.format,
            size: info.size.max(0) as u64,
            created_at: info.created_at,
        }
    }
}

/// Response body for GET /datasets/{id}/download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDownloadResponse {
    pub id: String,
    pub download_urls: Vec<String>,
}

/// Response body for GET /health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}
