use common::{ItemId, OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order addressed by the request does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The item does not exist, or exists under a different order.
    #[error("Item {item_id} not found in order {order_id}")]
    ItemNotFound { order_id: OrderId, item_id: ItemId },

    /// The product addressed by the request does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// An order payload referenced a product that does not exist.
    ///
    /// Distinct from [`StoreError::ProductNotFound`]: this is bad request
    /// input, not a missing addressed resource.
    #[error("Unknown product: {0}")]
    UnknownProduct(ProductId),

    /// A mutation was attempted on a completed order.
    #[error("Order {0} is completed and can no longer be modified")]
    CompletedOrderImmutable(OrderId),

    /// The order number collided with an existing order.
    #[error("Order number already exists: {0}")]
    DuplicateOrderNumber(String),

    /// The product is still referenced by order items and cannot be deleted.
    #[error("Product {0} is used in existing orders")]
    ProductInUse(ProductId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
