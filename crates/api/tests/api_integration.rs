//! Integration tests for the API server.
//!
//! Every test drives the full router over an in-memory store, so routing,
//! extraction, validation, store semantics, and error mapping are all
//! exercised exactly as a real client would see them.

use std::sync::{Arc, OnceLock};

use api::auth::{DynSessionVerifier, StaticTokenVerifier};
use api::routes::orders::AppState;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> axum::Router {
    setup_with_store().0
}

/// Builds the app and hands back the store too, for tests that need to
/// reach behind the HTTP surface (forcing an order-number collision).
fn setup_with_store() -> (axum::Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let verifier: DynSessionVerifier =
        Arc::new(StaticTokenVerifier::default().with_token("alice", "s3cret"));
    let state = Arc::new(AppState {
        store: store.clone(),
        verifier,
    });
    (api::create_app(state, get_metrics_handle()), store)
}

fn json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    send(app.clone(), json_request(method, uri, body)).await
}

async fn seed_product(app: &axum::Router, name: &str, price: &str) -> i64 {
    let (status, json) = request(
        app,
        "POST",
        "/products",
        Some(json!({ "name": name, "unit_price": price })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json["id"].as_i64().unwrap()
}

async fn create_order(app: &axum::Router, date: &str, items: Value) -> Value {
    let (status, json) = request(
        app,
        "POST",
        "/orders",
        Some(json!({ "date": date, "items": items })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    json
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = request(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_routes_get_a_json_not_found() {
    let app = setup();

    let (status, json) = request(&app, "GET", "/unknown", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Route not found");
}

#[tokio::test]
async fn test_create_order_returns_the_priced_order() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let gadget = seed_product(&app, "Gadget", "24.50").await;

    let order = create_order(
        &app,
        "2024-01-15",
        json!([
            { "product_id": widget, "qty": 3 },
            { "product_id": gadget, "qty": 1 },
        ]),
    )
    .await;

    assert_eq!(order["order_number"], "ORD-000001");
    assert_eq!(order["date"], "2024-01-15");
    assert_eq!(order["status"], "Pending");
    assert_eq!(order["final_price"], "54.47");

    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["product_id"], widget);
    assert_eq!(items[0]["qty"], 3);
    assert_eq!(items[0]["unit_price"], "9.99");
    assert_eq!(items[0]["subtotal"], "29.97");
    assert_eq!(items[1]["subtotal"], "24.50");
}

#[tokio::test]
async fn test_create_order_without_items_starts_empty() {
    let app = setup();

    let (status, order) = request(
        &app,
        "POST",
        "/orders",
        Some(json!({ "date": "2024-03-01" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "Pending");
    assert_eq!(order["final_price"], "0");
    assert!(order["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_order_requires_a_date() {
    let app = setup();

    let (status, json) = request(&app, "POST", "/orders", Some(json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "date is required");
}

#[tokio::test]
async fn test_create_order_rejects_a_malformed_date() {
    let app = setup();

    let (status, json) = request(
        &app,
        "POST",
        "/orders",
        Some(json!({ "date": "01/15/2024" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "date must be formatted as YYYY-MM-DD");
}

#[tokio::test]
async fn test_create_order_rejects_an_incomplete_item() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;

    let (status, json) = request(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "date": "2024-01-15",
            "items": [{ "product_id": widget }],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "each item requires product_id and qty");

    let (status, json) = request(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "date": "2024-01-15",
            "items": [{ "qty": 2 }],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "each item requires product_id and qty");
}

#[tokio::test]
async fn test_create_order_rejects_a_non_positive_qty() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;

    let (status, json) = request(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "date": "2024-01-15",
            "items": [{ "product_id": widget, "qty": 0 }],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "qty must be at least 1 (got 0)");
}

#[tokio::test]
async fn test_create_order_with_an_unknown_product_leaves_nothing_behind() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;

    let (status, json) = request(
        &app,
        "POST",
        "/orders",
        Some(json!({
            "date": "2024-01-15",
            "items": [
                { "product_id": widget, "qty": 1 },
                { "product_id": 999, "qty": 1 },
            ],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "Unknown product: 999");

    // The valid first item must not survive the failed create.
    let (status, orders) = request(&app, "GET", "/orders", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_order_numbers_continue_from_the_highest_suffix() {
    let app = setup();

    let first = create_order(&app, "2024-01-01", json!([])).await;
    assert_eq!(first["order_number"], "ORD-000001");

    let second = create_order(&app, "2024-01-02", json!([])).await;
    assert_eq!(second["order_number"], "ORD-000002");

    // Renumbering an order moves the high-water mark for later creates.
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/orders/{}", second["id"]),
        Some(json!({ "order_number": "ORD-000042", "date": "2024-01-02", "items": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let third = create_order(&app, "2024-01-03", json!([])).await;
    assert_eq!(third["order_number"], "ORD-000043");
}

#[tokio::test]
async fn test_get_order_returns_items_and_total() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let created = create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 2 }]),
    )
    .await;

    let (status, order) = request(&app, "GET", &format!("/orders/{}", created["id"]), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["id"], created["id"]);
    assert_eq!(order["order_number"], "ORD-000001");
    assert_eq!(order["final_price"], "19.98");
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_get_missing_order_is_not_found() {
    let app = setup();

    let (status, json) = request(&app, "GET", "/orders/999", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Order not found");
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orders/not-a-number")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_orders_summarizes_without_items() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 3 }]),
    )
    .await;
    create_order(&app, "2024-01-16", json!([])).await;

    let (status, orders) = request(&app, "GET", "/orders", None).await;

    assert_eq!(status, StatusCode::OK);
    let orders = orders.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["order_number"], "ORD-000001");
    assert_eq!(orders[0]["final_price"], "29.97");
    assert_eq!(orders[1]["final_price"], "0");
    // Summaries carry totals, never the item lists themselves.
    assert!(orders[0].get("items").is_none());
}

#[tokio::test]
async fn test_replace_swaps_the_item_list() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let gadget = seed_product(&app, "Gadget", "24.50").await;
    let created = create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 3 }]),
    )
    .await;

    let (status, order) = request(
        &app,
        "PUT",
        &format!("/orders/{}", created["id"]),
        Some(json!({
            "order_number": "ORD-000777",
            "date": "2024-02-02",
            "items": [{ "product_id": gadget, "qty": 2 }],
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["order_number"], "ORD-000777");
    assert_eq!(order["date"], "2024-02-02");
    assert_eq!(order["final_price"], "49.00");
    let items = order["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], gadget);
}

#[tokio::test]
async fn test_replace_with_an_empty_list_clears_the_items() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let created = create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 3 }]),
    )
    .await;

    let (status, order) = request(
        &app,
        "PUT",
        &format!("/orders/{}", created["id"]),
        Some(json!({ "order_number": "ORD-000001", "date": "2024-01-15", "items": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(order["items"].as_array().unwrap().is_empty());
    assert_eq!(order["final_price"], "0");
}

#[tokio::test]
async fn test_replace_requires_header_fields() {
    let app = setup();
    let created = create_order(&app, "2024-01-15", json!([])).await;
    let uri = format!("/orders/{}", created["id"]);

    let (status, json) = request(&app, "PUT", &uri, Some(json!({ "date": "2024-02-02" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "order_number is required");

    let (status, json) = request(
        &app,
        "PUT",
        &uri,
        Some(json!({ "order_number": "ORD-000001" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "date is required");
}

#[tokio::test]
async fn test_replace_to_a_taken_number_conflicts() {
    let app = setup();
    create_order(&app, "2024-01-01", json!([])).await;
    let second = create_order(&app, "2024-01-02", json!([])).await;
    let uri = format!("/orders/{}", second["id"]);

    let (status, json) = request(
        &app,
        "PUT",
        &uri,
        Some(json!({ "order_number": "ORD-000001", "date": "2024-01-02", "items": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "Order number already exists");

    // Keeping its own number is not a collision.
    let (status, _) = request(
        &app,
        "PUT",
        &uri,
        Some(json!({ "order_number": "ORD-000002", "date": "2024-01-02", "items": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_generated_number_collision_is_a_conflict() {
    let (app, store) = setup_with_store();
    create_order(&app, "2024-01-01", json!([])).await;

    store.force_next_order_number("ORD-000001").await;
    let (status, json) = request(
        &app,
        "POST",
        "/orders",
        Some(json!({ "date": "2024-01-02" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["message"], "Order number already exists");

    let (_, orders) = request(&app, "GET", "/orders", None).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_status_moves_through_the_lifecycle() {
    let app = setup();
    let created = create_order(&app, "2024-01-15", json!([])).await;
    let uri = format!("/orders/{}/status", created["id"]);

    let (status, order) = request(
        &app,
        "PATCH",
        &uri,
        Some(json!({ "status": "InProgress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "InProgress");

    let (status, order) =
        request(&app, "PATCH", &uri, Some(json!({ "status": "Completed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "Completed");
}

#[tokio::test]
async fn test_setting_the_same_status_twice_succeeds() {
    let app = setup();
    let created = create_order(&app, "2024-01-15", json!([])).await;
    let uri = format!("/orders/{}/status", created["id"]);

    for _ in 0..2 {
        let (status, order) = request(
            &app,
            "PATCH",
            &uri,
            Some(json!({ "status": "InProgress" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["status"], "InProgress");
    }
}

#[tokio::test]
async fn test_unknown_status_label_is_rejected() {
    let app = setup();
    let created = create_order(&app, "2024-01-15", json!([])).await;
    let uri = format!("/orders/{}/status", created["id"]);

    let (status, json) = request(&app, "PATCH", &uri, Some(json!({ "status": "Shipped" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        json["message"],
        "status must be one of: Pending, InProgress, Completed"
    );

    let (status, json) = request(&app, "PATCH", &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "status is required");

    // The rejected labels never reached the store.
    let (_, order) = request(&app, "GET", &format!("/orders/{}", created["id"]), None).await;
    assert_eq!(order["status"], "Pending");
}

#[tokio::test]
async fn test_completed_orders_lock_out_every_mutation() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let created = create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 1 }]),
    )
    .await;
    let id = created["id"].as_i64().unwrap();
    let item_id = created["items"][0]["id"].as_i64().unwrap();

    let (status, _) = request(
        &app,
        "PATCH",
        &format!("/orders/{id}/status"),
        Some(json!({ "status": "Completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let attempts = [
        json_request(
            "PUT",
            &format!("/orders/{id}"),
            Some(json!({ "order_number": "ORD-000009", "date": "2024-03-03", "items": [] })),
        ),
        json_request(
            "PATCH",
            &format!("/orders/{id}/status"),
            Some(json!({ "status": "Pending" })),
        ),
        json_request("DELETE", &format!("/orders/{id}"), None),
        json_request(
            "POST",
            &format!("/orders/{id}/items"),
            Some(json!({ "product_id": widget, "qty": 1 })),
        ),
        json_request(
            "PUT",
            &format!("/orders/{id}/items/{item_id}"),
            Some(json!({ "qty": 2 })),
        ),
        json_request("DELETE", &format!("/orders/{id}/items/{item_id}"), None),
    ];
    for req in attempts {
        let (status, json) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(json["message"], "Cannot modify a completed order");
    }

    // Reads still work.
    let (status, order) = request(&app, "GET", &format!("/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "Completed");
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_order_removes_it_and_its_items() {
    let (app, store) = setup_with_store();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let created = create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 2 }]),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, json) = request(&app, "DELETE", &format!("/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Order deleted successfully");

    let (status, _) = request(&app, "GET", &format!("/orders/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(store.item_count().await, 0);
}

#[tokio::test]
async fn test_delete_missing_order_is_not_found() {
    let app = setup();

    let (status, json) = request(&app, "DELETE", "/orders/42", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Order not found");
}

#[tokio::test]
async fn test_items_of_a_missing_order_read_as_empty() {
    let app = setup();

    let (status, items) = request(&app, "GET", "/orders/31337/items", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(items.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_added_items_snapshot_the_current_price() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let created = create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 1 }]),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    // Reprice the product, then add a second line for it.
    let (status, _) = request(
        &app,
        "PUT",
        &format!("/products/{widget}"),
        Some(json!({ "name": "Widget", "unit_price": "19.99" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, item) = request(
        &app,
        "POST",
        &format!("/orders/{id}/items"),
        Some(json!({ "product_id": widget, "qty": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(item["unit_price"], "19.99");

    // The first line keeps the price it was created at.
    let (_, order) = request(&app, "GET", &format!("/orders/{id}"), None).await;
    let items = order["items"].as_array().unwrap();
    assert_eq!(items[0]["unit_price"], "9.99");
    assert_eq!(items[1]["unit_price"], "19.99");
    assert_eq!(order["final_price"], "29.98");
}

#[tokio::test]
async fn test_add_item_requires_product_and_qty() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let created = create_order(&app, "2024-01-15", json!([])).await;
    let uri = format!("/orders/{}/items", created["id"]);

    let (status, json) = request(&app, "POST", &uri, Some(json!({ "qty": 1 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "product_id is required");

    let (status, json) = request(&app, "POST", &uri, Some(json!({ "product_id": widget }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "qty is required");
}

#[tokio::test]
async fn test_add_item_rejects_a_non_positive_qty() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let created = create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 1 }]),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, json) = request(
        &app,
        "POST",
        &format!("/orders/{id}/items"),
        Some(json!({ "product_id": widget, "qty": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "qty must be at least 1 (got 0)");

    // The rejected line never reached the order.
    let (status, items) = request(&app, "GET", &format!("/orders/{id}/items"), None).await;
    assert_eq!(status, StatusCode::OK);
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["qty"], 1);
}

#[tokio::test]
async fn test_update_item_keeps_the_price_unless_overridden() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let created = create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 3 }]),
    )
    .await;
    let id = created["id"].as_i64().unwrap();
    let item_id = created["items"][0]["id"].as_i64().unwrap();
    let uri = format!("/orders/{id}/items/{item_id}");

    let (status, item) = request(&app, "PUT", &uri, Some(json!({ "qty": 5 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["qty"], 5);
    assert_eq!(item["unit_price"], "9.99");
    assert_eq!(item["subtotal"], "49.95");

    let (status, item) = request(
        &app,
        "PUT",
        &uri,
        Some(json!({ "qty": 2, "unit_price": "11.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["unit_price"], "11.00");
    assert_eq!(item["subtotal"], "22.00");

    let (_, order) = request(&app, "GET", &format!("/orders/{id}"), None).await;
    assert_eq!(order["final_price"], "22.00");
}

#[tokio::test]
async fn test_update_item_validates_its_payload() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let created = create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 1 }]),
    )
    .await;
    let uri = format!(
        "/orders/{}/items/{}",
        created["id"], created["items"][0]["id"]
    );

    let (status, json) = request(&app, "PUT", &uri, Some(json!({ "unit_price": "5.00" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "qty is required");

    let (status, json) = request(&app, "PUT", &uri, Some(json!({ "qty": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "qty must be at least 1 (got 0)");

    let (status, json) = request(
        &app,
        "PUT",
        &uri,
        Some(json!({ "qty": 1, "unit_price": "-2.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "unit_price must not be negative");
}

#[tokio::test]
async fn test_item_mutations_are_scoped_to_their_order() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let first = create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 1 }]),
    )
    .await;
    let second = create_order(&app, "2024-01-16", json!([])).await;
    let foreign_uri = format!(
        "/orders/{}/items/{}",
        second["id"], first["items"][0]["id"]
    );

    let (status, json) = request(&app, "PUT", &foreign_uri, Some(json!({ "qty": 2 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Item not found in this order");

    let (status, json) = request(&app, "DELETE", &foreign_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Item not found in this order");
}

#[tokio::test]
async fn test_remove_item_updates_the_total() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let gadget = seed_product(&app, "Gadget", "24.50").await;
    let created = create_order(
        &app,
        "2024-01-15",
        json!([
            { "product_id": widget, "qty": 3 },
            { "product_id": gadget, "qty": 1 },
        ]),
    )
    .await;
    let id = created["id"].as_i64().unwrap();
    let item_id = created["items"][1]["id"].as_i64().unwrap();

    let (status, json) =
        request(&app, "DELETE", &format!("/orders/{id}/items/{item_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Item removed successfully");

    let (_, order) = request(&app, "GET", &format!("/orders/{id}"), None).await;
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert_eq!(order["final_price"], "29.97");
}

#[tokio::test]
async fn test_product_crud_roundtrip() {
    let app = setup();

    let (status, product) = request(
        &app,
        "POST",
        "/products",
        Some(json!({ "name": "Widget", "unit_price": "9.99" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(product["name"], "Widget");
    assert_eq!(product["unit_price"], "9.99");
    let id = product["id"].as_i64().unwrap();

    let (status, products) = request(&app, "GET", "/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(products.as_array().unwrap().len(), 1);

    let (status, product) = request(
        &app,
        "PUT",
        &format!("/products/{id}"),
        Some(json!({ "name": "Widget Pro", "unit_price": "12.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["name"], "Widget Pro");
    assert_eq!(product["unit_price"], "12.00");

    let (status, json) = request(&app, "DELETE", &format!("/products/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Product deleted successfully");

    let (status, json) = request(&app, "GET", &format!("/products/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Product not found");
}

#[tokio::test]
async fn test_product_validation_messages() {
    let app = setup();

    let cases = [
        (json!({}), "name is required"),
        (json!({ "name": "Widget" }), "unit_price is required"),
        (
            json!({ "name": "   ", "unit_price": "1.00" }),
            "name must not be empty",
        ),
        (
            json!({ "name": "Widget", "unit_price": "-1" }),
            "unit_price must not be negative",
        ),
    ];
    for (body, message) in cases {
        let (status, json) = request(&app, "POST", "/products", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], message);
    }
}

#[tokio::test]
async fn test_products_in_use_cannot_be_deleted() {
    let app = setup();
    let widget = seed_product(&app, "Widget", "9.99").await;
    let order = create_order(
        &app,
        "2024-01-15",
        json!([{ "product_id": widget, "qty": 1 }]),
    )
    .await;

    let (status, json) = request(&app, "DELETE", &format!("/products/{widget}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(
        json["message"],
        "Cannot delete product: it is used in existing orders"
    );

    // Dropping the order releases the product.
    let (status, _) = request(&app, "DELETE", &format!("/orders/{}", order["id"]), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = request(&app, "DELETE", &format!("/products/{widget}"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_product_reads_as_not_found() {
    let app = setup();

    let (status, json) = request(
        &app,
        "PUT",
        "/products/77",
        Some(json!({ "name": "Ghost", "unit_price": "1.00" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["message"], "Product not found");

    let (status, _) = request(&app, "DELETE", "/products/77", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_requests_without_a_token_pass_anonymously() {
    let app = setup();

    let (status, orders) = request(&app, "GET", "/orders", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(orders.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_an_invalid_token_is_rejected_on_every_route() {
    let app = setup();

    for uri in ["/orders", "/health"] {
        let req = Request::builder()
            .uri(uri)
            .header("authorization", "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send(app.clone(), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["message"], "Invalid session token");
    }
}

#[tokio::test]
async fn test_me_reports_the_verified_identity() {
    let app = setup();

    let req = Request::builder()
        .uri("/auth/me")
        .header("authorization", "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "alice");

    // The cookie carries the same session token.
    let req = Request::builder()
        .uri("/auth/me")
        .header("cookie", "auth_token=s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "alice");
}

#[tokio::test]
async fn test_me_requires_a_token() {
    let app = setup();

    let (status, json) = request(&app, "GET", "/auth/me", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["message"], "Authentication required");
}
