//! Error types for dataset operations.

use super::limits::human_readable_decimal;
use axum::http::StatusCode;
use std::collections::BTreeSet;

/// Errors that can occur during dataset operations.
#[derive(Debug)]
pub enum DatasetError {
    /// Upload grew past the configured byte ceiling.
    PayloadTooLarge { limit: u64 },
    /// Header row lacks fields the format requires.
    MissingFields {
        format: String,
        missing: BTreeSet<String>,
    },
    /// Header row has fields the format does not allow.
    InvalidFields {
        format: String,
        invalid: BTreeSet<String>,
        allowed: BTreeSet<String>,
    },
    /// Upload could not be read as delimited text.
    UnprocessableContent(anyhow::Error),
    /// Uploaded filename has no usable final component.
    InvalidFilename(String),
    /// Dataset not found.
    NotFound(String),
    /// Storage error (reading, writing, listing, signing).
    Storage(anyhow::Error),
    /// Catalog error (database operations).
    Catalog(anyhow::Error),
    /// Programming error, e.g. a format without a registered schema.
    Internal(anyhow::Error),
}

fn join(fields: &BTreeSet<String>) -> String {
    fields.iter().cloned().collect::<Vec<_>>().join(", ")
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PayloadTooLarge { limit } => write!(
                f,
                "File upload exceeds the {} limit.",
                human_readable_decimal(*limit)
            ),
            Self::MissingFields { format, missing } => write!(
                f,
                "{} dataset is missing the required fields: {}.",
                format,
                join(missing)
            ),
            Self::InvalidFields {
                format,
                invalid,
                allowed,
            } => write!(
                f,
                "{} dataset contains the invalid fields: {}. Only {} are allowed.",
                format,
                join(invalid),
                join(allowed)
            ),
            Self::UnprocessableContent(_) => write!(f, "Dataset is not a valid CSV file."),
            Self::InvalidFilename(name) => write!(f, "Invalid dataset filename '{}'", name),
            Self::NotFound(msg) => write!(f, "{}", msg),
            Self::Storage(e) => write!(f, "Storage error: {}", e),
            Self::Catalog(e) => write!(f, "Catalog error: {}", e),
            Self::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for DatasetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::UnprocessableContent(e)
            | Self::Storage(e)
            | Self::Catalog(e)
            | Self::Internal(e) => Some(&**e),
            _ => None,
        }
    }
}

impl DatasetError {
    pub(crate) fn dataset_not_found(id: &str) -> Self {
        Self::NotFound(format!("Dataset '{}' not found.", id))
    }

    /// Transport status code for this failure.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::MissingFields { .. } | Self::InvalidFields { .. } => StatusCode::FORBIDDEN,
            Self::UnprocessableContent(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidFilename(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Catalog(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Returns true if this is a not found error (404).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
