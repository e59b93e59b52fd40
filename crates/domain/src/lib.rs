//! Domain types for the order-management API.
//!
//! This crate provides:
//! - The order status lifecycle (`OrderStatus`) that locks an order once completed
//! - The order aggregate (`Order`) with its line items and derived final price
//! - Product catalog entries whose current price is snapshotted onto items
//! - Validated input types for order and product payloads

pub mod error;
pub mod order;
pub mod product;

pub use error::ValidationError;
pub use order::{NewOrderItem, Order, OrderItem, OrderStatus, OrderSummary, parse_order_date};
pub use product::{NewProduct, Product};
