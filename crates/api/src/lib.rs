//! HTTP API server with observability for the order-management system.
//!
//! Provides REST endpoints for products, orders, and their line items,
//! with session verification, structured logging (tracing) and Prometheus
//! metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let verifier = state.verifier.clone();

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/auth/me", get(auth::me))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}", put(routes::orders::replace::<S>))
        .route("/orders/{id}", delete(routes::orders::remove::<S>))
        .route("/orders/{id}/status", patch(routes::orders::set_status::<S>))
        .route("/orders/{id}/items", get(routes::items::list::<S>))
        .route("/orders/{id}/items", post(routes::items::add::<S>))
        .route("/orders/{id}/items/{item_id}", put(routes::items::update::<S>))
        .route(
            "/orders/{id}/items/{item_id}",
            delete(routes::items::remove::<S>),
        )
        .route("/products", get(routes::products::list::<S>))
        .route("/products", post(routes::products::create::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/products/{id}", put(routes::products::update::<S>))
        .route("/products/{id}", delete(routes::products::remove::<S>))
        .fallback(routes::not_found)
        .with_state(state)
        .merge(metrics_router)
        .layer(middleware::from_fn_with_state(verifier, auth::authenticate))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
