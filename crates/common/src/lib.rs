pub mod types;

pub use types::{ItemId, OrderId, ProductId};
