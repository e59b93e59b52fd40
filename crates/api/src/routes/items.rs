//! Line-item endpoints nested under an order.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ItemId, OrderId, ProductId};
use domain::{NewOrderItem, ValidationError};
use rust_decimal::Decimal;
use serde::Deserialize;
use store::OrderStore;

use super::orders::{AppState, ItemResponse, MessageResponse};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: Option<ProductId>,
    pub qty: Option<i32>,
}

#[derive(Deserialize)]
pub struct UpdateItemRequest {
    pub qty: Option<i32>,
    /// Absent means "keep the snapshot price", never zero.
    pub unit_price: Option<Decimal>,
}

// -- Handlers --

/// GET /orders/{id}/items — list the order's items.
///
/// Deliberately ungated: the items of an absent order are an empty list.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<ItemResponse>>, ApiError> {
    let items = state.store.list_order_items(OrderId::new(id)).await?;
    Ok(Json(items.into_iter().map(ItemResponse::from).collect()))
}

/// POST /orders/{id}/items — add one line item at the current product price.
#[tracing::instrument(skip(state, req))]
pub async fn add<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<ItemResponse>), ApiError> {
    let product_id = req.product_id.ok_or(ValidationError::Missing {
        field: "product_id",
    })?;
    let qty = req.qty.ok_or(ValidationError::Missing { field: "qty" })?;
    let item = NewOrderItem::new(product_id, qty)?;

    let stored = state.store.add_order_item(OrderId::new(id), item).await?;
    Ok((StatusCode::CREATED, Json(stored.into())))
}

/// PUT /orders/{id}/items/{item_id} — change the quantity, optionally
/// overriding the snapshot price.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, item_id)): Path<(i64, i64)>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<ItemResponse>, ApiError> {
    let qty = req.qty.ok_or(ValidationError::Missing { field: "qty" })?;
    if qty < 1 {
        return Err(ValidationError::QuantityTooSmall { qty }.into());
    }
    if let Some(price) = req.unit_price
        && price < Decimal::ZERO
    {
        return Err(ValidationError::NegativePrice.into());
    }

    let item = state
        .store
        .update_order_item(OrderId::new(id), ItemId::new(item_id), qty, req.unit_price)
        .await?;
    Ok(Json(item.into()))
}

/// DELETE /orders/{id}/items/{item_id} — remove one line item.
#[tracing::instrument(skip(state))]
pub async fn remove<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((id, item_id)): Path<(i64, i64)>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .store
        .remove_order_item(OrderId::new(id), ItemId::new(item_id))
        .await?;
    Ok(Json(MessageResponse {
        message: "Item removed successfully".to_string(),
    }))
}
