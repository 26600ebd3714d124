use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{NotificationId, OrderId, ProductId, UserId};
use domain::{
    InventoryRecord, Money, Notification, NotificationCategory, Order, OrderLine, OrderStatus,
    Product,
};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    store::{Store, StoreTx},
};

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    /// Adds or replaces a catalog product.
    pub async fn upsert_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sets the inventory record of a product outside of any order flow.
    pub async fn upsert_inventory(&self, record: &InventoryRecord) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        save_inventory(&mut conn, record).await
    }
}

fn to_i32(value: u32, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::InvalidData(format!("{field} out of range")))
}

fn to_u32(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidData(format!("negative {field}: {value}")))
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
    })
}

fn row_to_inventory(row: PgRow) -> Result<InventoryRecord> {
    Ok(InventoryRecord {
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        available: to_u32(row.try_get("available")?, "available")?,
        reserved: to_u32(row.try_get("reserved")?, "reserved")?,
    })
}

fn row_to_line(row: &PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        id: row.try_get("id")?,
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
        quantity: to_u32(row.try_get("quantity")?, "quantity")?,
        unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
    })
}

fn row_to_order(row: &PgRow, lines: Vec<OrderLine>) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status: OrderStatus = status
        .parse()
        .map_err(|e: domain::OrderError| StoreError::InvalidData(e.to_string()))?;

    Ok(Order::restore(
        OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        lines,
        Money::from_cents(row.try_get("total_cents")?),
        status,
        row.try_get::<DateTime<Utc>, _>("created_at")?,
        row.try_get::<DateTime<Utc>, _>("updated_at")?,
    ))
}

fn row_to_notification(row: PgRow) -> Result<Notification> {
    let category: String = row.try_get("category")?;
    Ok(Notification {
        id: NotificationId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
        category: category
            .parse::<NotificationCategory>()
            .map_err(StoreError::InvalidData)?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        read: row.try_get("read")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn fetch_product(conn: &mut PgConnection, product_id: ProductId) -> Result<Option<Product>> {
    let row = sqlx::query("SELECT id, name, price_cents FROM products WHERE id = $1")
        .bind(product_id.as_uuid())
        .fetch_optional(conn)
        .await?;

    row.map(row_to_product).transpose()
}

async fn fetch_lines(conn: &mut PgConnection, order_ids: &[Uuid]) -> Result<Vec<OrderLine>> {
    let rows = sqlx::query(
        r#"
        SELECT id, order_id, product_id, quantity, unit_price_cents
        FROM order_lines
        WHERE order_id = ANY($1)
        ORDER BY order_id, position ASC
        "#,
    )
    .bind(order_ids)
    .fetch_all(conn)
    .await?;

    rows.iter().map(row_to_line).collect()
}

async fn fetch_order(
    conn: &mut PgConnection,
    order_id: OrderId,
    for_update: bool,
) -> Result<Option<Order>> {
    let sql = if for_update {
        "SELECT id, user_id, total_cents, status, created_at, updated_at FROM orders WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT id, user_id, total_cents, status, created_at, updated_at FROM orders WHERE id = $1"
    };

    let Some(row) = sqlx::query(sql)
        .bind(order_id.as_uuid())
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let lines = fetch_lines(conn, &[order_id.as_uuid()]).await?;
    row_to_order(&row, lines).map(Some)
}

async fn save_inventory(conn: &mut PgConnection, record: &InventoryRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory (product_id, available, reserved)
        VALUES ($1, $2, $3)
        ON CONFLICT (product_id) DO UPDATE SET
            available = EXCLUDED.available,
            reserved = EXCLUDED.reserved
        "#,
    )
    .bind(record.product_id.as_uuid())
    .bind(to_i32(record.available, "available")?)
    .bind(to_i32(record.reserved, "reserved")?)
    .execute(conn)
    .await?;

    Ok(())
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresTx;

    async fn begin(&self) -> Result<PostgresTx> {
        Ok(PostgresTx {
            tx: self.pool.begin().await?,
        })
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, order_id, false).await
    }

    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query(
            r#"
            SELECT id, user_id, total_cents, status, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&mut *conn)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<std::result::Result<_, _>>()?;

        let mut lines_by_order: HashMap<OrderId, Vec<OrderLine>> = HashMap::new();
        for line in fetch_lines(&mut conn, &ids).await? {
            lines_by_order.entry(line.order_id).or_default().push(line);
        }

        rows.iter()
            .zip(ids)
            .map(|(row, id)| {
                let lines = lines_by_order
                    .remove(&OrderId::from_uuid(id))
                    .unwrap_or_default();
                row_to_order(row, lines)
            })
            .collect()
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, product_id).await
    }

    async fn get_inventory(&self, product_id: ProductId) -> Result<Option<InventoryRecord>> {
        let row = sqlx::query(
            "SELECT product_id, available, reserved FROM inventory WHERE product_id = $1",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_inventory).transpose()
    }

    async fn list_notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, category, title, message, read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_notification).collect()
    }
}

/// Transaction over a [`PostgresStore`].
///
/// Locked reads use `SELECT ... FOR UPDATE`; PostgreSQL holds those row
/// locks until commit or rollback.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn get_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        fetch_product(&mut self.tx, product_id).await
    }

    async fn lock_inventory(&mut self, product_id: ProductId) -> Result<Option<InventoryRecord>> {
        let row = sqlx::query(
            "SELECT product_id, available, reserved FROM inventory WHERE product_id = $1 FOR UPDATE",
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(row_to_inventory).transpose()
    }

    async fn save_inventory(&mut self, record: &InventoryRecord) -> Result<()> {
        save_inventory(&mut self.tx, record).await
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, total_cents, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.user_id().as_uuid())
        .bind(order.total_amount().cents())
        .bind(order.status().as_str())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *self.tx)
        .await?;

        for (position, line) in order.lines().iter().enumerate() {
            let position = i32::try_from(position)
                .map_err(|_| StoreError::InvalidData("too many order lines".to_string()))?;

            sqlx::query(
                r#"
                INSERT INTO order_lines (id, order_id, position, product_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(line.id)
            .bind(line.order_id.as_uuid())
            .bind(position)
            .bind(line.product_id.as_uuid())
            .bind(to_i32(line.quantity, "quantity")?)
            .bind(line.unit_price.cents())
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> Result<Option<Order>> {
        fetch_order(&mut self.tx, order_id, true).await
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id().as_uuid())
            .bind(order.status().as_str())
            .bind(order.updated_at())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::InvalidData(format!(
                "order {} does not exist",
                order.id()
            )));
        }
        Ok(())
    }

    async fn insert_notification(&mut self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, category, title, message, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(notification.id.as_uuid())
        .bind(notification.user_id.as_uuid())
        .bind(notification.category.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await.map_err(|e| {
            let err = StoreError::from(e);
            if err.is_retryable() {
                tracing::warn!(error = %err, "Commit lost a lock conflict");
            }
            err
        })
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
