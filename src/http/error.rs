use crate::datasets::DatasetError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// API error with HTTP status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub code: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.to_string(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", message)
    }

    pub fn unprocessable_entity(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "UNPROCESSABLE_ENTITY",
            message,
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            message,
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "code": self.code,
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(e) = err.downcast_ref::<DatasetError>() {
            return ApiError::from_dataset_error(e);
        }
        ApiError::internal_error(err.to_string())
    }
}

impl From<DatasetError> for ApiError {
    fn from(e: DatasetError) -> Self {
        if !e.is_client_error() {
            tracing::error!(error = %e, "Dataset operation failed");
        }
        ApiError::from_dataset_error(&e)
    }
}

impl ApiError {
    fn from_dataset_error(e: &DatasetError) -> Self {
        let constructor = match e.status_code() {
            StatusCode::PAYLOAD_TOO_LARGE => ApiError::payload_too_large,
            StatusCode::FORBIDDEN => ApiError::forbidden,
            StatusCode::UNPROCESSABLE_ENTITY => ApiError::unprocessable_entity,
            StatusCode::BAD_REQUEST => ApiError::bad_request,
            StatusCode::NOT_FOUND => ApiError::not_found,
            _ => ApiError::internal_error,
        };
        constructor(e.to_string())
    }
}
