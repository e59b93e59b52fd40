//! HTTP route handlers, grouped by resource.

pub mod health;
pub mod items;
pub mod metrics;
pub mod orders;
pub mod products;

use crate::error::ApiError;

/// Fallback for requests that match no route.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Route not found".to_string())
}
