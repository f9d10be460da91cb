//! Payment domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use boutique_core::{OrderId, PaymentId, PaymentStatus, Price, UserId};

/// A payment recorded when an order is confirmed. At most one per order.
#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Price,
    pub status: PaymentStatus,
    /// Stripe `PaymentIntent` ID, required for refunds.
    pub payment_intent_id: Option<String>,
    /// Stripe Checkout Session ID.
    pub checkout_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
