//! Order domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use boutique_core::{OrderId, OrderLineId, OrderStatus, Price, ProductId, UserId, VariantId};

use super::Payment;

/// An order. `total_price` is fixed when the order is created.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_price: Price,
    pub delivery_address: String,
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order line with the unit price captured at creation.
#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: u32,
    pub unit_price: Price,
}

/// An order with its lines and payment, if any.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderLine>,
    pub payment: Option<Payment>,
}
