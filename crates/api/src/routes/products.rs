//! Product catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::ProductId;
use domain::{NewProduct, Product, ValidationError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::OrderStore;

use super::orders::{AppState, MessageResponse};
use crate::error::ApiError;

/// Request payload shared by create and update.
#[derive(Deserialize)]
pub struct ProductRequest {
    pub name: Option<String>,
    pub unit_price: Option<Decimal>,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            unit_price: product.unit_price,
        }
    }
}

/// GET /products — list the catalog.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.store.list_products().await?;
    Ok(Json(
        products.into_iter().map(ProductResponse::from).collect(),
    ))
}

/// GET /products/{id} — load one product.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .store
        .get_product(ProductId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    Ok(Json(product.into()))
}

/// POST /products — add a product to the catalog.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state.store.create_product(validate(req)?).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /products/{id} — update name and current price.
///
/// Existing order items keep their snapshot of the old price.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .store
        .update_product(ProductId::new(id), validate(req)?)
        .await?;
    Ok(Json(product.into()))
}

/// DELETE /products/{id} — remove a product unless an order references it.
#[tracing::instrument(skip(state))]
pub async fn remove<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.delete_product(ProductId::new(id)).await?;
    Ok(Json(MessageResponse {
        message: "Product deleted successfully".to_string(),
    }))
}

fn validate(req: ProductRequest) -> Result<NewProduct, ApiError> {
    let name = req.name.ok_or(ValidationError::Missing { field: "name" })?;
    let unit_price = req.unit_price.ok_or(ValidationError::Missing {
        field: "unit_price",
    })?;
    Ok(NewProduct::new(name, unit_price)?)
}
