//! API Error Handling
//!
//! Maps registry errors onto HTTP statuses with a JSON error envelope.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::RegistryError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unavailable(msg) => {
                tracing::error!("Registry store unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "registry unavailable".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(msg) => ApiError::NotFound(msg),
            RegistryError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            RegistryError::InvalidTransition { .. } => ApiError::Conflict(err.to_string()),
            RegistryError::Unavailable(store) => ApiError::Unavailable(store.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
