use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{ItemId, OrderId, ProductId};
use domain::{NewOrderItem, NewProduct, Order, OrderItem, OrderStatus, OrderSummary, Product};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::{Result, StoreError, store::OrderStore};

/// Order header without its items.
#[derive(Debug, Clone)]
struct Header {
    id: OrderId,
    order_number: String,
    date: NaiveDate,
    status: OrderStatus,
}

#[derive(Debug, Default)]
struct Inner {
    orders: BTreeMap<OrderId, Header>,
    items: BTreeMap<ItemId, OrderItem>,
    products: BTreeMap<ProductId, Product>,
    next_order_id: i64,
    next_item_id: i64,
    next_product_id: i64,
    forced_order_number: Option<String>,
}

impl Inner {
    /// Looks up an order and checks the lifecycle gate.
    fn gate(&self, id: OrderId) -> Result<&Header> {
        let header = self
            .orders
            .get(&id)
            .ok_or(StoreError::OrderNotFound(id))?;
        if header.status.is_terminal() {
            return Err(StoreError::CompletedOrderImmutable(id));
        }
        Ok(header)
    }

    fn next_order_number(&mut self) -> String {
        if let Some(number) = self.forced_order_number.take() {
            return number;
        }
        // Suffixes longer than 18 digits are skipped like any other foreign
        // format; they may not fit in an i64.
        let max = self
            .orders
            .values()
            .filter_map(|h| h.order_number.strip_prefix("ORD-"))
            .filter(|suffix| {
                !suffix.is_empty()
                    && suffix.len() <= 18
                    && suffix.bytes().all(|b| b.is_ascii_digit())
            })
            .filter_map(|suffix| suffix.parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        format!("ORD-{:06}", max.saturating_add(1))
    }

    fn number_taken(&self, number: &str, exclude: Option<OrderId>) -> bool {
        self.orders
            .values()
            .any(|h| h.order_number == number && Some(h.id) != exclude)
    }

    /// Reads the product's current price at the snapshot moment.
    fn snapshot_price(&self, product_id: ProductId) -> Result<Decimal> {
        self.products
            .get(&product_id)
            .map(|p| p.unit_price)
            .ok_or(StoreError::UnknownProduct(product_id))
    }

    fn insert_item(&mut self, order_id: OrderId, item: NewOrderItem, price: Decimal) -> OrderItem {
        self.next_item_id += 1;
        let stored = OrderItem {
            id: ItemId::new(self.next_item_id),
            order_id,
            product_id: item.product_id(),
            qty: item.qty(),
            unit_price: price,
        };
        self.items.insert(stored.id, stored.clone());
        stored
    }

    fn items_of(&self, order_id: OrderId) -> Vec<OrderItem> {
        self.items
            .values()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect()
    }

    fn assemble(&self, header: &Header) -> Order {
        Order {
            id: header.id,
            order_number: header.order_number.clone(),
            date: header.date,
            status: header.status,
            items: self.items_of(header.id),
        }
    }
}

/// In-memory order store for tests and local development.
///
/// Mutations validate everything they need up front and only then touch
/// the maps, so a failing operation leaves no partial state behind. The
/// single `RwLock` plays the role the per-order row lock plays in the
/// PostgreSQL store.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the next allocated order number, so tests can provoke a
    /// number collision deterministically.
    pub async fn force_next_order_number(&self, number: impl Into<String>) {
        self.inner.write().await.forced_order_number = Some(number.into());
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    /// Returns the number of stored items across all orders.
    pub async fn item_count(&self) -> usize {
        self.inner.read().await.items.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn list_orders(&self) -> Result<Vec<OrderSummary>> {
        let inner = self.inner.read().await;
        Ok(inner
            .orders
            .values()
            .map(|header| {
                let final_price = inner
                    .items_of(header.id)
                    .iter()
                    .map(OrderItem::subtotal)
                    .sum();
                OrderSummary {
                    id: header.id,
                    order_number: header.order_number.clone(),
                    date: header.date,
                    status: header.status,
                    final_price,
                }
            })
            .collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let inner = self.inner.read().await;
        Ok(inner.orders.get(&id).map(|header| inner.assemble(header)))
    }

    async fn create_order(&self, date: NaiveDate, items: Vec<NewOrderItem>) -> Result<Order> {
        let mut inner = self.inner.write().await;

        // Price every item before touching the maps.
        let priced: Vec<(NewOrderItem, Decimal)> = items
            .into_iter()
            .map(|item| Ok((item, inner.snapshot_price(item.product_id())?)))
            .collect::<Result<_>>()?;

        let number = inner.next_order_number();
        if inner.number_taken(&number, None) {
            return Err(StoreError::DuplicateOrderNumber(number));
        }

        inner.next_order_id += 1;
        let header = Header {
            id: OrderId::new(inner.next_order_id),
            order_number: number,
            date,
            status: OrderStatus::Pending,
        };
        for (item, price) in priced {
            inner.insert_item(header.id, item, price);
        }
        let order = inner.assemble(&header);
        inner.orders.insert(header.id, header);
        Ok(order)
    }

    async fn replace_order(
        &self,
        id: OrderId,
        order_number: &str,
        date: NaiveDate,
        items: Vec<NewOrderItem>,
    ) -> Result<Order> {
        let mut inner = self.inner.write().await;
        let status = inner.gate(id)?.status;

        if inner.number_taken(order_number, Some(id)) {
            return Err(StoreError::DuplicateOrderNumber(order_number.to_string()));
        }
        let priced: Vec<(NewOrderItem, Decimal)> = items
            .into_iter()
            .map(|item| Ok((item, inner.snapshot_price(item.product_id())?)))
            .collect::<Result<_>>()?;

        inner.items.retain(|_, item| item.order_id != id);
        for (item, price) in priced {
            inner.insert_item(id, item, price);
        }

        let header = Header {
            id,
            order_number: order_number.to_string(),
            date,
            status,
        };
        let order = inner.assemble(&header);
        inner.orders.insert(id, header);
        Ok(order)
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut inner = self.inner.write().await;
        let header = Header {
            status,
            ..inner.gate(id)?.clone()
        };
        let order = inner.assemble(&header);
        inner.orders.insert(id, header);
        Ok(order)
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.gate(id)?;
        inner.orders.remove(&id);
        inner.items.retain(|_, item| item.order_id != id);
        Ok(())
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        // No existence gate: items of an absent order are an empty list.
        Ok(self.inner.read().await.items_of(order_id))
    }

    async fn add_order_item(&self, order_id: OrderId, item: NewOrderItem) -> Result<OrderItem> {
        let mut inner = self.inner.write().await;
        inner.gate(order_id)?;
        let price = inner.snapshot_price(item.product_id())?;
        Ok(inner.insert_item(order_id, item, price))
    }

    async fn update_order_item(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        qty: i32,
        unit_price: Option<Decimal>,
    ) -> Result<OrderItem> {
        let mut inner = self.inner.write().await;
        inner.gate(order_id)?;

        let item = inner
            .items
            .get_mut(&item_id)
            .filter(|item| item.order_id == order_id)
            .ok_or(StoreError::ItemNotFound { order_id, item_id })?;

        item.qty = qty;
        if let Some(price) = unit_price {
            item.unit_price = price;
        }
        Ok(item.clone())
    }

    async fn remove_order_item(&self, order_id: OrderId, item_id: ItemId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.gate(order_id)?;

        let found = inner
            .items
            .get(&item_id)
            .is_some_and(|item| item.order_id == order_id);
        if !found {
            return Err(StoreError::ItemNotFound { order_id, item_id });
        }
        inner.items.remove(&item_id);
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.inner.read().await.products.values().cloned().collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.inner.read().await.products.get(&id).cloned())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let mut inner = self.inner.write().await;
        inner.next_product_id += 1;
        let stored = Product {
            id: ProductId::new(inner.next_product_id),
            name: product.name().to_string(),
            unit_price: product.unit_price(),
        };
        inner.products.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_product(&self, id: ProductId, product: NewProduct) -> Result<Product> {
        let mut inner = self.inner.write().await;
        let stored = inner
            .products
            .get_mut(&id)
            .ok_or(StoreError::ProductNotFound(id))?;
        stored.name = product.name().to_string();
        stored.unit_price = product.unit_price();
        Ok(stored.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.products.contains_key(&id) {
            return Err(StoreError::ProductNotFound(id));
        }
        if inner.items.values().any(|item| item.product_id == id) {
            return Err(StoreError::ProductInUse(id));
        }
        inner.products.remove(&id);
        Ok(())
    }
}
