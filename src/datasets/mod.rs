//! Dataset uploads: size guarding, format validation and the dataset service.

pub mod error;
pub mod format;
pub mod limits;
pub mod service;

pub use error::DatasetError;
pub use format::{validate_format, DatasetFormat, FormatSchema};
pub use limits::{human_readable_decimal, stream_with_size_limit};
pub use service::{DatasetService, DatasetSettings, StagedUpload};
