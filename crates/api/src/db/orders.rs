//! Order repository.
//!
//! Status changes are conditional updates (`WHERE status = $from`), so two
//! concurrent transitions of the same order cannot both succeed.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use boutique_core::{OrderId, OrderLineId, OrderStatus, Price, ProductId, UserId, VariantId};

use super::{RepositoryError, to_u32, to_u64};
use crate::models::{Order, OrderLine};

const ORDER_COLUMNS: &str = "id, user_id, status, total_price, delivery_address, payment_method, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    status: OrderStatus,
    total_price: Price,
    delivery_address: String,
    payment_method: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(r: OrderRow) -> Self {
        Self {
            id: OrderId::new(r.id),
            user_id: UserId::new(r.user_id),
            status: r.status,
            total_price: r.total_price,
            delivery_address: r.delivery_address,
            payment_method: r.payment_method,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: i32,
    variant_id: i32,
    product_id: i32,
    product_name: String,
    color: Option<String>,
    size: Option<String>,
    quantity: i32,
    unit_price: Price,
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = RepositoryError;

    fn try_from(r: OrderLineRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderLineId::new(r.id),
            variant_id: VariantId::new(r.variant_id),
            product_id: ProductId::new(r.product_id),
            product_name: r.product_name,
            color: r.color,
            size: r.size,
            quantity: to_u32(r.quantity, "quantity")?,
            unit_price: r.unit_price,
        })
    }
}

/// Fields of a new order.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: UserId,
    pub total_price: Price,
    pub delivery_address: &'a str,
    pub payment_method: &'a str,
}

/// Repository for orders and their lines.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert an order in `En attente` inside an existing transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_in(
        conn: &mut PgConnection,
        order: &NewOrder<'_>,
    ) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (user_id, total_price, delivery_address, payment_method)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id)
        .bind(order.total_price)
        .bind(order.delivery_address)
        .bind(order.payment_method)
        .fetch_one(conn)
        .await?;

        Ok(row.into())
    }

    /// Insert an order line inside an existing transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn insert_line_in(
        conn: &mut PgConnection,
        order_id: OrderId,
        variant_id: VariantId,
        quantity: u32,
        unit_price: Price,
    ) -> Result<(), RepositoryError> {
        let quantity = i32::try_from(quantity)
            .map_err(|_| RepositoryError::DataCorruption(format!("quantity overflow: {quantity}")))?;

        sqlx::query(
            r"
            INSERT INTO order_variants (order_id, variant_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(order_id)
        .bind(variant_id)
        .bind(quantity)
        .bind(unit_price)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Get an order and lock its row until the transaction ends.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_in(
        conn: &mut PgConnection,
        id: OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Lines of an order with product details.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, order_id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::lines_in(&mut *conn, order_id).await
    }

    /// Lines of an order, inside an existing transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines_in(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(
            r"
            SELECT ov.id, ov.variant_id, p.id AS product_id, p.name AS product_name,
                   pv.color, pv.size, ov.quantity, ov.unit_price
            FROM order_variants ov
            JOIN product_variants pv ON pv.id = ov.variant_id
            JOIN products p ON p.id = pv.product_id
            WHERE ov.order_id = $1
            ORDER BY ov.id
            ",
        )
        .bind(order_id)
        .fetch_all(conn)
        .await?;

        rows.into_iter().map(OrderLine::try_from).collect()
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Order>, u64), RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        Ok((
            rows.into_iter().map(Order::from).collect(),
            to_u64(total, "order count")?,
        ))
    }

    /// All orders, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Order>, u64), RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE ($1::order_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE ($1::order_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok((
            rows.into_iter().map(Order::from).collect(),
            to_u64(total, "order count")?,
        ))
    }

    /// Move an order from `from` to `to` if it is still in `from`.
    ///
    /// Returns `None` when the order is missing or no longer in `from`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transition_in(
        conn: &mut PgConnection,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            UPDATE orders SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(Order::from))
    }
}
