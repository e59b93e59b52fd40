//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::ValidationError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
///
/// Client-facing bodies are `{"message": ...}` with a stable message per
/// failure; server faults additionally carry the diagnostic under `"error"`.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or invalid session token.
    Unauthorized(String),
    /// The order is completed and locked.
    Forbidden(String),
    /// Resource not found.
    NotFound(String),
    /// Uniqueness or referential-integrity conflict.
    Conflict(String),
    /// Internal server error with a diagnostic detail.
    Internal { message: String, detail: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            ApiError::Internal { message, detail } => {
                tracing::error!(error = %detail, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, message, Some(detail))
            }
        };

        let body = match detail {
            Some(detail) => serde_json::json!({ "message": message, "error": detail }),
            None => serde_json::json!({ "message": message }),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(_) => ApiError::NotFound("Order not found".to_string()),
            StoreError::ItemNotFound { .. } => {
                ApiError::NotFound("Item not found in this order".to_string())
            }
            StoreError::ProductNotFound(_) => ApiError::NotFound("Product not found".to_string()),
            StoreError::UnknownProduct(id) => ApiError::BadRequest(format!("Unknown product: {id}")),
            StoreError::CompletedOrderImmutable(_) => {
                ApiError::Forbidden("Cannot modify a completed order".to_string())
            }
            StoreError::DuplicateOrderNumber(_) => {
                ApiError::Conflict("Order number already exists".to_string())
            }
            StoreError::ProductInUse(_) => ApiError::Conflict(
                "Cannot delete product: it is used in existing orders".to_string(),
            ),
            err @ (StoreError::Database(_) | StoreError::Migration(_)) => ApiError::Internal {
                message: "Internal server error".to_string(),
                detail: err.to_string(),
            },
        }
    }
}
