pub mod datasets_controller;
pub mod health_controller;

pub use datasets_controller::{
    delete_dataset, download_dataset, get_dataset, list_datasets, upload_dataset,
};
pub use health_controller::health_handler;
