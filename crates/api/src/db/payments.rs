//! Payment repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use boutique_core::{OrderId, PaymentId, PaymentStatus, Price, UserId};

use super::{RepositoryError, to_u64};
use crate::models::Payment;

const PAYMENT_COLUMNS: &str = "id, order_id, user_id, amount, status, payment_intent_id, checkout_session_id, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: i32,
    order_id: i32,
    user_id: i32,
    amount: Price,
    status: PaymentStatus,
    payment_intent_id: Option<String>,
    checkout_session_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentRow> for Payment {
    fn from(r: PaymentRow) -> Self {
        Self {
            id: PaymentId::new(r.id),
            order_id: OrderId::new(r.order_id),
            user_id: UserId::new(r.user_id),
            amount: r.amount,
            status: r.status,
            payment_intent_id: r.payment_intent_id,
            checkout_session_id: r.checkout_session_id,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Fields of a confirmed payment.
#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Price,
    pub payment_intent_id: Option<&'a str>,
    pub checkout_session_id: Option<&'a str>,
}

/// Repository for payments.
pub struct PaymentRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentRepository<'a> {
    /// Create a new payment repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a `Payé` payment inside an existing transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order already has a payment.
    pub async fn create_paid_in(
        conn: &mut PgConnection,
        payment: &NewPayment<'_>,
    ) -> Result<Payment, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            INSERT INTO payments (order_id, user_id, amount, status, payment_intent_id, checkout_session_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(payment.order_id)
        .bind(payment.user_id)
        .bind(payment.amount)
        .bind(PaymentStatus::Paid)
        .bind(payment.payment_intent_id)
        .bind(payment.checkout_session_id)
        .fetch_one(conn)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "order already has a payment"))?;

        Ok(row.into())
    }

    /// Get a payment by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Payment::from))
    }

    /// Get the payment of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_order(&self, order_id: OrderId) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Payment::from))
    }

    /// Lock the payment of an order for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lock_by_order_in(
        conn: &mut PgConnection,
        order_id: OrderId,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(Payment::from))
    }

    /// Record the Stripe references of a payment confirmed by hand.
    ///
    /// Only fills references that are still empty.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the payment has no free slot.
    pub async fn attach_stripe_in(
        conn: &mut PgConnection,
        id: PaymentId,
        payment_intent_id: &str,
        checkout_session_id: Option<&str>,
    ) -> Result<Payment, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            UPDATE payments
            SET payment_intent_id = $2,
                checkout_session_id = COALESCE(checkout_session_id, $3),
                updated_at = NOW()
            WHERE id = $1 AND payment_intent_id IS NULL
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(payment_intent_id)
        .bind(checkout_session_id)
        .fetch_optional(conn)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// A user's payments, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Payment>, u64), RepositoryError> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            SELECT {PAYMENT_COLUMNS} FROM payments
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

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        Ok((
            rows.into_iter().map(Payment::from).collect(),
            to_u64(total, "payment count")?,
        ))
    }

    /// Move a payment from `from` to `to` if it is still in `from`.
    ///
    /// Returns `None` when the payment is missing or no longer in `from`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn transition_in(
        conn: &mut PgConnection,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Option<Payment>, RepositoryError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r"
            UPDATE payments SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(conn)
        .await?;

        Ok(row.map(Payment::from))
    }
}
