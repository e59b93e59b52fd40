//! Product catalog entries.

use common::ProductId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A product in the catalog.
///
/// `unit_price` is the current price; order items copy it when they are added
/// and keep their copy when it changes later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
}

/// A validated product payload, used for both create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    name: String,
    unit_price: Decimal,
}

impl NewProduct {
    /// Creates a product payload, rejecting blank names and negative prices.
    pub fn new(name: impl Into<String>, unit_price: Decimal) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if unit_price < Decimal::ZERO {
            return Err(ValidationError::NegativePrice);
        }
        Ok(Self { name, unit_price })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }
}
