//! Order aggregate and related types.

mod status;

pub use status::OrderStatus;

use chrono::NaiveDate;
use common::{ItemId, OrderId, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A line item belonging to an order.
///
/// The unit price is the product's price as of the moment the item was added
/// (or the override supplied by a later update), never the product's current
/// price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: ItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub qty: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    /// Returns `qty × unit_price`.
    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.qty) * self.unit_price
    }
}

/// An order header together with all of its items, ordered by item id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub date: NaiveDate,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Returns the sum of the current items' subtotals.
    ///
    /// Always recomputed from the items; never stored ahead of them.
    pub fn final_price(&self) -> Decimal {
        self.items.iter().map(OrderItem::subtotal).sum()
    }
}

/// An order header with its computed total, as returned by list queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: OrderId,
    pub order_number: String,
    pub date: NaiveDate,
    pub status: OrderStatus,
    pub final_price: Decimal,
}

/// A validated item of an incoming order payload: which product and how many.
///
/// Deliberately carries no price; the unit price is snapshotted from the
/// product inside the store transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderItem {
    product_id: ProductId,
    qty: i32,
}

impl NewOrderItem {
    /// Creates a new item request, rejecting quantities below one.
    pub fn new(product_id: ProductId, qty: i32) -> Result<Self, ValidationError> {
        if qty < 1 {
            return Err(ValidationError::QuantityTooSmall { qty });
        }
        Ok(Self { product_id, qty })
    }

    /// The product the item references.
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    /// How many units were requested.
    pub fn qty(&self) -> i32 {
        self.qty
    }
}

/// Parses an order date from its wire format (`YYYY-MM-DD`).
pub fn parse_order_date(s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        given: s.to_string(),
    })
}
