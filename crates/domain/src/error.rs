//! Domain validation errors.

use thiserror::Error;

/// Errors raised while validating request input, before any store work.
///
/// Every variant maps to an HTTP 400 at the API boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field (or pair of fields) was absent from the payload.
    #[error("{field} is required")]
    Missing { field: &'static str },

    /// An item in an order payload lacked its product or quantity.
    #[error("each item requires product_id and qty")]
    IncompleteItem,

    /// The supplied date was not `YYYY-MM-DD`.
    #[error("date must be formatted as YYYY-MM-DD")]
    InvalidDate { given: String },

    /// Quantity below the minimum of one.
    #[error("qty must be at least 1 (got {qty})")]
    QuantityTooSmall { qty: i32 },

    /// A status label outside the closed set of three.
    #[error("status must be one of: Pending, InProgress, Completed")]
    UnknownStatus { given: String },

    /// Product name empty or whitespace only.
    #[error("name must not be empty")]
    EmptyName,

    /// Negative unit price.
    #[error("unit_price must not be negative")]
    NegativePrice,
}
