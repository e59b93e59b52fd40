use async_trait::async_trait;
use chrono::NaiveDate;
use common::{ItemId, OrderId, ProductId};
use domain::{NewOrderItem, NewProduct, Order, OrderItem, OrderStatus, OrderSummary, Product};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{Result, StoreError, store::OrderStore};

/// PostgreSQL-backed order store implementation.
///
/// Every mutating operation runs inside one transaction. The order header
/// row is locked (`FOR UPDATE`) before the lifecycle gate is checked, so
/// concurrent edits to the same order serialize and never act on a stale
/// status.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_summary(row: PgRow) -> Result<OrderSummary> {
        Ok(OrderSummary {
            id: OrderId::new(row.try_get("id")?),
            order_number: row.try_get("order_number")?,
            date: row.try_get("order_date")?,
            status: parse_status(row.try_get::<String, _>("status")?.as_str())?,
            final_price: row.try_get("final_price")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            id: ItemId::new(row.try_get("id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            qty: row.try_get("qty")?,
            unit_price: row.try_get("unit_price")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            unit_price: row.try_get("unit_price")?,
        })
    }

    /// Locks the order header row and checks the lifecycle gate.
    ///
    /// The row lock comes first so concurrent mutations of the same order
    /// serialize; the gate then fails on an absent or completed order.
    async fn lock_order(conn: &mut PgConnection, id: OrderId) -> Result<OrderStatus> {
        let row = sqlx::query("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_i64())
            .fetch_optional(&mut *conn)
            .await?;

        let Some(row) = row else {
            return Err(StoreError::OrderNotFound(id));
        };

        let status = parse_status(row.try_get::<String, _>("status")?.as_str())?;
        if status.is_terminal() {
            return Err(StoreError::CompletedOrderImmutable(id));
        }
        Ok(status)
    }

    /// Allocates the next order number as `ORD-` plus a zero-padded
    /// max-suffix-plus-one. Suffixes longer than 18 digits are skipped like
    /// any other foreign format; they may not fit in a BIGINT.
    ///
    /// Concurrent transactions may allocate the same number; the unique
    /// constraint turns the loser into `DuplicateOrderNumber` at commit.
    async fn next_order_number(conn: &mut PgConnection) -> Result<String> {
        let max: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(CAST(SUBSTRING(order_number FROM 5) AS BIGINT))
            FROM orders
            WHERE order_number ~ '^ORD-[0-9]{1,18}$'
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;

        Ok(format!("ORD-{:06}", max.unwrap_or(0).saturating_add(1)))
    }

    /// Inserts one item, snapshotting the product's current price onto it.
    async fn insert_item(
        conn: &mut PgConnection,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> Result<ItemId> {
        let price: Option<Decimal> =
            sqlx::query_scalar("SELECT unit_price FROM products WHERE id = $1")
                .bind(item.product_id().as_i64())
                .fetch_optional(&mut *conn)
                .await?;

        let Some(price) = price else {
            return Err(StoreError::UnknownProduct(item.product_id()));
        };

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_items (order_id, product_id, qty, unit_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(order_id.as_i64())
        .bind(item.product_id().as_i64())
        .bind(item.qty())
        .bind(price)
        .fetch_one(&mut *conn)
        .await?;

        Ok(ItemId::new(id))
    }

    /// Transaction body for `create_order`.
    async fn insert_order(
        conn: &mut PgConnection,
        date: NaiveDate,
        items: &[NewOrderItem],
    ) -> Result<OrderId> {
        let number = Self::next_order_number(conn).await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (order_number, order_date, status)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&number)
        .bind(date)
        .bind(OrderStatus::Pending.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| map_order_number_conflict(e, &number))?;

        let id = OrderId::new(id);
        for item in items {
            Self::insert_item(conn, id, item).await?;
        }
        Ok(id)
    }

    /// Transaction body for `replace_order`.
    async fn replace_contents(
        conn: &mut PgConnection,
        id: OrderId,
        order_number: &str,
        date: NaiveDate,
        items: &[NewOrderItem],
    ) -> Result<()> {
        Self::lock_order(conn, id).await?;

        sqlx::query("UPDATE orders SET order_number = $1, order_date = $2 WHERE id = $3")
            .bind(order_number)
            .bind(date)
            .bind(id.as_i64())
            .execute(&mut *conn)
            .await
            .map_err(|e| map_order_number_conflict(e, order_number))?;

        // Full replace, not a diff: clear everything, then re-insert.
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(id.as_i64())
            .execute(&mut *conn)
            .await?;

        for item in items {
            Self::insert_item(conn, id, item).await?;
        }
        Ok(())
    }

    /// Transaction body for `update_order_status`.
    async fn set_status(conn: &mut PgConnection, id: OrderId, status: OrderStatus) -> Result<()> {
        Self::lock_order(conn, id).await?;

        sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(id.as_i64())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Transaction body for `delete_order`.
    async fn delete_order_row(conn: &mut PgConnection, id: OrderId) -> Result<()> {
        Self::lock_order(conn, id).await?;

        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .execute(&mut *conn)
            .await?;

        // Zero rows after a passed gate means another deleter won the race.
        if deleted.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(id));
        }
        Ok(())
    }

    /// Transaction body for `add_order_item`.
    async fn add_item(
        conn: &mut PgConnection,
        order_id: OrderId,
        item: &NewOrderItem,
    ) -> Result<ItemId> {
        Self::lock_order(conn, order_id).await?;
        Self::insert_item(conn, order_id, item).await
    }

    /// Transaction body for `update_order_item`.
    async fn update_item(
        conn: &mut PgConnection,
        order_id: OrderId,
        item_id: ItemId,
        qty: i32,
        unit_price: Option<Decimal>,
    ) -> Result<()> {
        Self::lock_order(conn, order_id).await?;

        // COALESCE keeps the snapshot price when no override is supplied.
        let updated = sqlx::query(
            r#"
            UPDATE order_items
            SET qty = $1, unit_price = COALESCE($2, unit_price)
            WHERE id = $3 AND order_id = $4
            "#,
        )
        .bind(qty)
        .bind(unit_price)
        .bind(item_id.as_i64())
        .bind(order_id.as_i64())
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::ItemNotFound { order_id, item_id });
        }
        Ok(())
    }

    /// Transaction body for `remove_order_item`.
    async fn remove_item(
        conn: &mut PgConnection,
        order_id: OrderId,
        item_id: ItemId,
    ) -> Result<()> {
        Self::lock_order(conn, order_id).await?;

        let deleted = sqlx::query("DELETE FROM order_items WHERE id = $1 AND order_id = $2")
            .bind(item_id.as_i64())
            .bind(order_id.as_i64())
            .execute(&mut *conn)
            .await?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::ItemNotFound { order_id, item_id });
        }
        Ok(())
    }

    /// Reloads one item scoped to its order.
    async fn fetch_item(&self, order_id: OrderId, item_id: ItemId) -> Result<OrderItem> {
        let row = sqlx::query(
            r#"
            SELECT id, order_id, product_id, qty, unit_price
            FROM order_items
            WHERE id = $1 AND order_id = $2
            "#,
        )
        .bind(item_id.as_i64())
        .bind(order_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_item(row),
            None => Err(StoreError::ItemNotFound { order_id, item_id }),
        }
    }

    /// Reloads the full aggregate after a successful mutation.
    async fn reload_order(&self, id: OrderId) -> Result<Order> {
        self.get_order(id)
            .await?
            .ok_or(StoreError::OrderNotFound(id))
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn list_orders(&self) -> Result<Vec<OrderSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT o.id, o.order_number, o.order_date, o.status,
                   COALESCE(SUM(i.qty * i.unit_price), 0) AS final_price
            FROM orders o
            LEFT JOIN order_items i ON i.order_id = o.id
            GROUP BY o.id
            ORDER BY o.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_summary).collect()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let header = sqlx::query(
            "SELECT id, order_number, order_date, status FROM orders WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        let Some(header) = header else {
            return Ok(None);
        };

        let items = self.list_order_items(id).await?;

        Ok(Some(Order {
            id: OrderId::new(header.try_get("id")?),
            order_number: header.try_get("order_number")?,
            date: header.try_get("order_date")?,
            status: parse_status(header.try_get::<String, _>("status")?.as_str())?,
            items,
        }))
    }

    async fn create_order(&self, date: NaiveDate, items: Vec<NewOrderItem>) -> Result<Order> {
        let start = std::time::Instant::now();
        let mut tx = self.pool.begin().await?;

        let id = match Self::insert_order(&mut tx, date, &items).await {
            Ok(id) => id,
            Err(err) => {
                rollback(tx).await;
                metrics::histogram!("order_create_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
                return Err(err);
            }
        };

        tx.commit().await?;
        metrics::histogram!("order_create_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        metrics::counter!("orders_created_total").increment(1);

        self.reload_order(id).await
    }

    async fn replace_order(
        &self,
        id: OrderId,
        order_number: &str,
        date: NaiveDate,
        items: Vec<NewOrderItem>,
    ) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        if let Err(err) = Self::replace_contents(&mut tx, id, order_number, date, &items).await {
            rollback(tx).await;
            return Err(err);
        }

        tx.commit().await?;
        metrics::counter!("orders_replaced_total").increment(1);

        self.reload_order(id).await
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        if let Err(err) = Self::set_status(&mut tx, id, status).await {
            rollback(tx).await;
            return Err(err);
        }

        tx.commit().await?;
        metrics::counter!("order_status_changes_total").increment(1);

        self.reload_order(id).await
    }

    async fn delete_order(&self, id: OrderId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if let Err(err) = Self::delete_order_row(&mut tx, id).await {
            rollback(tx).await;
            return Err(err);
        }

        tx.commit().await?;
        metrics::counter!("orders_deleted_total").increment(1);
        Ok(())
    }

    async fn list_order_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        // No existence gate: items of an absent order are an empty list.
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, qty, unit_price
            FROM order_items
            WHERE order_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn add_order_item(&self, order_id: OrderId, item: NewOrderItem) -> Result<OrderItem> {
        let mut tx = self.pool.begin().await?;

        let item_id = match Self::add_item(&mut tx, order_id, &item).await {
            Ok(id) => id,
            Err(err) => {
                rollback(tx).await;
                return Err(err);
            }
        };

        tx.commit().await?;
        metrics::counter!("order_items_added_total").increment(1);

        self.fetch_item(order_id, item_id).await
    }

    async fn update_order_item(
        &self,
        order_id: OrderId,
        item_id: ItemId,
        qty: i32,
        unit_price: Option<Decimal>,
    ) -> Result<OrderItem> {
        let mut tx = self.pool.begin().await?;

        if let Err(err) = Self::update_item(&mut tx, order_id, item_id, qty, unit_price).await {
            rollback(tx).await;
            return Err(err);
        }

        tx.commit().await?;
        metrics::counter!("order_items_updated_total").increment(1);

        self.fetch_item(order_id, item_id).await
    }

    async fn remove_order_item(&self, order_id: OrderId, item_id: ItemId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if let Err(err) = Self::remove_item(&mut tx, order_id, item_id).await {
            rollback(tx).await;
            return Err(err);
        }

        tx.commit().await?;
        metrics::counter!("order_items_removed_total").increment(1);
        Ok(())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query("SELECT id, name, unit_price FROM products ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT id, name, unit_price FROM products WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, unit_price)
            VALUES ($1, $2)
            RETURNING id, name, unit_price
            "#,
        )
        .bind(product.name())
        .bind(product.unit_price())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }

    async fn update_product(&self, id: ProductId, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET name = $1, unit_price = $2
            WHERE id = $3
            RETURNING id, name, unit_price
            "#,
        )
        .bind(product.name())
        .bind(product.unit_price())
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::row_to_product(row),
            None => Err(StoreError::ProductNotFound(id)),
        }
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("order_items_product_id_fkey")
                {
                    return StoreError::ProductInUse(id);
                }
                StoreError::Database(e)
            })?;

        if deleted.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(id));
        }
        Ok(())
    }
}

/// Decodes a persisted status label; an unknown label is corrupt data.
fn parse_status(label: &str) -> Result<OrderStatus> {
    label
        .parse::<OrderStatus>()
        .map_err(|err| StoreError::Database(sqlx::Error::Decode(Box::new(err))))
}

/// Maps a unique-constraint violation on the order number to its own error.
fn map_order_number_conflict(err: sqlx::Error, number: &str) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.constraint() == Some("orders_order_number_key")
    {
        return StoreError::DuplicateOrderNumber(number.to_string());
    }
    StoreError::Database(err)
}

/// Rolls the transaction back explicitly, keeping the original error.
async fn rollback(tx: Transaction<'_, Postgres>) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %err, "transaction rollback failed");
    }
}
