//! Order CRUD and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use common::{ItemId, OrderId, ProductId};
use domain::{
    NewOrderItem, Order, OrderItem, OrderStatus, OrderSummary, ValidationError, parse_order_date,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::OrderStore;

use crate::auth::DynSessionVerifier;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: OrderStore> {
    pub store: S,
    pub verifier: DynSessionVerifier,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub date: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemPayload>,
}

#[derive(Deserialize)]
pub struct ReplaceOrderRequest {
    pub order_number: Option<String>,
    pub date: Option<String>,
    #[serde(default)]
    pub items: Vec<ItemPayload>,
}

/// One item of an order payload; both fields required per item.
#[derive(Deserialize)]
pub struct ItemPayload {
    pub product_id: Option<ProductId>,
    pub qty: Option<i32>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub date: NaiveDate,
    pub status: OrderStatus,
    pub items: Vec<ItemResponse>,
    pub final_price: Decimal,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let final_price = order.final_price();
        Self {
            id: order.id,
            order_number: order.order_number,
            date: order.date,
            status: order.status,
            items: order.items.into_iter().map(ItemResponse::from).collect(),
            final_price,
        }
    }
}

#[derive(Serialize)]
pub struct OrderSummaryResponse {
    pub id: OrderId,
    pub order_number: String,
    pub date: NaiveDate,
    pub status: OrderStatus,
    pub final_price: Decimal,
}

impl From<OrderSummary> for OrderSummaryResponse {
    fn from(summary: OrderSummary) -> Self {
        Self {
            id: summary.id,
            order_number: summary.order_number,
            date: summary.date,
            status: summary.status,
            final_price: summary.final_price,
        }
    }
}

#[derive(Serialize)]
pub struct ItemResponse {
    pub id: ItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub qty: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl From<OrderItem> for ItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            subtotal: item.subtotal(),
            id: item.id,
            order_id: item.order_id,
            product_id: item.product_id,
            qty: item.qty,
            unit_price: item.unit_price,
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Handlers --

/// GET /orders — list all orders with their computed totals.
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderSummaryResponse>>, ApiError> {
    let orders = state.store.list_orders().await?;
    Ok(Json(
        orders.into_iter().map(OrderSummaryResponse::from).collect(),
    ))
}

/// GET /orders/{id} — load one order with its items.
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .store
        .get_order(OrderId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".to_string()))?;
    Ok(Json(order.into()))
}

/// POST /orders — create a new order with an optional item list.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let date = req.date.ok_or(ValidationError::Missing { field: "date" })?;
    let date = parse_order_date(&date)?;
    let items = collect_items(req.items)?;

    let order = state.store.create_order(date, items).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// PUT /orders/{id} — replace the header fields and the full item list.
#[tracing::instrument(skip(state, req))]
pub async fn replace<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<ReplaceOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_number = req.order_number.ok_or(ValidationError::Missing {
        field: "order_number",
    })?;
    let date = req.date.ok_or(ValidationError::Missing { field: "date" })?;
    let date = parse_order_date(&date)?;
    let items = collect_items(req.items)?;

    let order = state
        .store
        .replace_order(OrderId::new(id), &order_number, date, items)
        .await?;
    Ok(Json(order.into()))
}

/// PATCH /orders/{id}/status — move the order through its lifecycle.
#[tracing::instrument(skip(state, req))]
pub async fn set_status<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let label = req
        .status
        .ok_or(ValidationError::Missing { field: "status" })?;
    let status = label.parse::<OrderStatus>()?;

    let order = state
        .store
        .update_order_status(OrderId::new(id), status)
        .await?;
    Ok(Json(order.into()))
}

/// DELETE /orders/{id} — delete the order and its items.
#[tracing::instrument(skip(state))]
pub async fn remove<S: OrderStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.store.delete_order(OrderId::new(id)).await?;
    Ok(Json(MessageResponse {
        message: "Order deleted successfully".to_string(),
    }))
}

/// Validates every payload item before any store work happens.
pub(super) fn collect_items(payloads: Vec<ItemPayload>) -> Result<Vec<NewOrderItem>, ApiError> {
    payloads
        .into_iter()
        .map(|payload| {
            let (Some(product_id), Some(qty)) = (payload.product_id, payload.qty) else {
                return Err(ValidationError::IncompleteItem.into());
            };
            NewOrderItem::new(product_id, qty).map_err(ApiError::from)
        })
        .collect()
}
