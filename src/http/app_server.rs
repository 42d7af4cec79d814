use crate::datasets::DatasetService;
use crate::http::controllers::{
    delete_dataset, download_dataset, get_dataset, health_handler, list_datasets, upload_dataset,
};
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

pub struct AppServer {
    pub router: Router,
    pub service: Arc<DatasetService>,
}

pub const PATH_HEALTH: &str = "/health";
pub const PATH_DATASETS: &str = "/datasets";
pub const PATH_DATASET: &str = "/datasets/:id";
pub const PATH_DATASET_DOWNLOAD: &str = "/datasets/:id/download";

impl AppServer {
    pub fn new(service: DatasetService) -> Self {
        Self::from_arc(Arc::new(service))
    }

    pub fn from_arc(service: Arc<DatasetService>) -> Self {
        AppServer {
            router: Router::new()
                .route(PATH_HEALTH, get(health_handler))
                .route(
                    PATH_DATASETS,
                    get(list_datasets)
                        .post(upload_dataset)
                        // Uploads are bounded by the streaming size guard instead.
                        .layer(DefaultBodyLimit::disable()),
                )
                .route(PATH_DATASET, get(get_dataset).delete(delete_dataset))
                .route(PATH_DATASET_DOWNLOAD, get(download_dataset))
                .with_state(service.clone()),
            service,
        }
    }
}
