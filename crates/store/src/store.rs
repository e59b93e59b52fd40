use async_trait::async_trait;
use chrono::NaiveDate;
use common::{ItemId, OrderId, ProductId};
use domain::{NewOrderItem, NewProduct, Order, OrderItem, OrderStatus, OrderSummary, Product};
use rust_decimal::Decimal;

use crate::Result;

/// Core trait for order store implementations.
///
/// The store owns the transaction boundary: every mutating operation runs
/// atomically, re-checks the order's status against the freshest persisted
/// row before writing, and returns data re-read after commit rather than
/// assembled in memory. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Lists all orders with their computed totals.
    async fn list_orders(&self) -> Result<Vec<OrderSummary>>;

    /// Loads one order with its items, or `None` if it does not exist.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Creates an order atomically: allocates the next order number, inserts
    /// the header with status Pending, and inserts every item with the
    /// product's current price as its snapshot.
    ///
    /// An unknown product aborts the whole operation with `UnknownProduct`;
    /// no partial order ever becomes visible. A collision on the generated
    /// order number surfaces as `DuplicateOrderNumber`.
    async fn create_order(&self, date: NaiveDate, items: Vec<NewOrderItem>) -> Result<Order>;

    /// Replaces an order's header and full item list atomically.
    ///
    /// Deletes all existing items and re-inserts the supplied list under the
    /// same per-item validation and snapshot rule as create. On any failure
    /// the previous items stay intact.
    async fn replace_order(
        &self,
        id: OrderId,
        order_number: &str,
        date: NaiveDate,
        items: Vec<NewOrderItem>,
    ) -> Result<Order>;

    /// Sets the order's status.
    ///
    /// The current status must not already be Completed; moving a status to
    /// itself is a no-op success.
    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order>;

    /// Deletes an order and, by cascade, its items.
    async fn delete_order(&self, id: OrderId) -> Result<()>;

    /// Lists an order's items.
    ///
    /// Deliberately unguarded: an absent order yields an empty list, not an
    /// error.
    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// Adds one item with the product's current price as its snapshot.
    async fn add_order_item(&self, order_id: OrderId, item: NewOrderItem) -> Result<OrderItem>;

    /// Updates an item's quantity, and its unit price only when an override
    /// is supplied; a missing override keeps the snapshot price.
    ///
    /// The item must belong to the given order, otherwise `ItemNotFound`.
    async fn update_order_item(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        qty: i32,
        unit_price: Option<Decimal>,
    ) -> Result<OrderItem>;

    /// Removes one item, scoped to the given order.
    async fn remove_order_item(&self, order_id: OrderId, item_id: ItemId) -> Result<()>;

    /// Lists all products.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Loads one product, or `None` if it does not exist.
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Creates a product.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Updates a product's name and current price.
    ///
    /// Existing order items keep their price snapshots.
    async fn update_product(&self, id: ProductId, product: NewProduct) -> Result<Product>;

    /// Deletes a product.
    ///
    /// Fails with `ProductInUse` while any order item references it.
    async fn delete_product(&self, id: ProductId) -> Result<()>;
}
