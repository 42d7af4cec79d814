pub mod catalog;
pub mod config;
pub mod datasets;
pub mod http;
pub mod id;
pub mod jobs;
pub mod storage;
pub mod telemetry;

pub use datasets::{DatasetError, DatasetService, DatasetSettings};
pub use jobs::{JobError, JobsClient, PollSettings};
