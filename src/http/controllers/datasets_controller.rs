use crate::datasets::{DatasetFormat, DatasetService, StagedUpload};
use crate::http::error::ApiError;
use crate::http::models::{DatasetDownloadResponse, DatasetResponse, ListingResponse};
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query as QueryParams, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

/// Default limit for listing datasets
const DEFAULT_DATASETS_LIMIT: usize = 100;

/// Maximum limit for listing datasets
const MAX_DATASETS_LIMIT: usize = 1000;

/// Multipart field carrying the file contents.
pub const FIELD_DATASET: &str = "dataset";
/// Multipart field carrying the dataset format.
pub const FIELD_FORMAT: &str = "format";

/// Query parameters for listing datasets
#[derive(Debug, Deserialize)]
pub struct ListDatasetsParams {
    /// Number of datasets to skip (default: 0)
    pub skip: Option<usize>,
    /// Maximum number of datasets to return (default: 100, max: 1000)
    pub limit: Option<usize>,
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::bad_request(format!("Malformed multipart body: {}", e))
}

/// Handler for POST /datasets - Upload a dataset
///
/// Expects a multipart body with a `dataset` file field and a `format` text
/// field, in either order. The file is streamed to a temporary file under the
/// configured size limit before anything is validated or stored.
#[tracing::instrument(
    name = "handler_upload_dataset",
    skip(service, multipart),
    fields(
        evalhub.dataset_id = tracing::field::Empty,
        evalhub.size_bytes = tracing::field::Empty,
    )
)]
pub async fn upload_dataset(
    State(service): State<Arc<DatasetService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DatasetResponse>), ApiError> {
    let mut staged: Option<(StagedUpload, String)> = None;
    let mut format: Option<DatasetFormat> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(FIELD_DATASET) => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::bad_request("The dataset field has no filename"))?;
                let upload = service.stage_upload(field).await?;
                staged = Some((upload, filename));
            }
            Some(FIELD_FORMAT) => {
                let value = field.text().await.map_err(multipart_error)?;
                format = Some(
                    value
                        .trim()
                        .parse::<DatasetFormat>()
                        .map_err(ApiError::unprocessable_entity)?,
                );
            }
            _ => {}
        }
    }

    let (upload, filename) = staged.ok_or_else(|| {
        ApiError::unprocessable_entity(format!("Missing form field '{}'", FIELD_DATASET))
    })?;
    let format = format.ok_or_else(|| {
        ApiError::unprocessable_entity(format!("Missing form field '{}'", FIELD_FORMAT))
    })?;

    tracing::Span::current().record("evalhub.size_bytes", upload.size());

    let dataset = service.commit_upload(upload, &filename, format).await?;

    tracing::Span::current().record("evalhub.dataset_id", &dataset.id);

    Ok((StatusCode::CREATED, Json(dataset)))
}

/// Handler for GET /datasets - List datasets
#[tracing::instrument(
    name = "handler_list_datasets",
    skip(service),
    fields(evalhub.dataset_count = tracing::field::Empty)
)]
pub async fn list_datasets(
    State(service): State<Arc<DatasetService>>,
    QueryParams(params): QueryParams<ListDatasetsParams>,
) -> Result<Json<ListingResponse<DatasetResponse>>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_DATASETS_LIMIT)
        .min(MAX_DATASETS_LIMIT);
    let skip = params.skip.unwrap_or(0);

    let listing = service.list_datasets(skip, limit).await?;

    tracing::Span::current().record("evalhub.dataset_count", listing.items.len());

    Ok(Json(listing))
}

/// Handler for GET /datasets/{id}
#[tracing::instrument(
    name = "handler_get_dataset",
    skip(service),
    fields(evalhub.dataset_id = %id)
)]
pub async fn get_dataset(
    State(service): State<Arc<DatasetService>>,
    Path(id): Path<String>,
) -> Result<Json<DatasetResponse>, ApiError> {
    Ok(Json(service.get_dataset(&id).await?))
}

/// Handler for DELETE /datasets/{id}
#[tracing::instrument(
    name = "handler_delete_dataset",
    skip(service),
    fields(evalhub.dataset_id = %id)
)]
pub async fn delete_dataset(
    State(service): State<Arc<DatasetService>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    service.delete_dataset(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for GET /datasets/{id}/download
#[tracing::instrument(
    name = "handler_download_dataset",
    skip(service),
    fields(evalhub.dataset_id = %id)
)]
pub async fn download_dataset(
    State(service): State<Arc<DatasetService>>,
    Path(id): Path<String>,
) -> Result<Json<DatasetDownloadResponse>, ApiError> {
    Ok(Json(service.get_dataset_download(&id).await?))
}
