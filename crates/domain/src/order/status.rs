//! Order status lifecycle.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The status of an order in its lifecycle.
///
/// ```text
/// Pending ◄────► InProgress
///     │              │
///     └──────┬───────┘
///            ▼
///        Completed
/// ```
///
/// Any status may move to any other while the current status is not
/// `Completed`; once completed, the order and its items are locked for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order has been created and not yet picked up.
    #[default]
    Pending,

    /// Order is being worked on.
    InProgress,

    /// Order is done; header and items are immutable (terminal state).
    Completed,
}

impl OrderStatus {
    /// Returns true if the order header and its items may still change.
    pub fn can_modify(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal status (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }

    /// Returns the status label exactly as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::InProgress => "InProgress",
            OrderStatus::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "InProgress" => Ok(OrderStatus::InProgress),
            "Completed" => Ok(OrderStatus::Completed),
            other => Err(ValidationError::UnknownStatus {
                given: other.to_string(),
            }),
        }
    }
}
