//! Vendor and admin dashboard figures.
//!
//! Revenue only counts orders that reached `Payé` (or a later shipping
//! status). Pending, cancelled and failed orders are excluded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boutique_core::{OrderId, OrderStatus, Price, ProductId, Role};

/// Bucket size for sales series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesPeriod {
    #[default]
    Day,
    Week,
    Month,
}

impl SalesPeriod {
    /// The `date_trunc` field name.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

/// One point of a sales series.
#[derive(Debug, Clone, Serialize)]
pub struct SalesPoint {
    /// Start of the bucket.
    pub period: DateTime<Utc>,
    pub revenue: Price,
    pub orders: u64,
}

/// A best-selling product.
#[derive(Debug, Clone, Serialize)]
pub struct TopProduct {
    pub product_id: ProductId,
    pub name: String,
    pub units_sold: u64,
    pub revenue: Price,
}

/// Headline figures for a vendor.
#[derive(Debug, Clone, Serialize)]
pub struct VendorDashboard {
    pub revenue: Price,
    pub paid_orders: u64,
    pub units_sold: u64,
    pub product_count: u64,
    pub top_products: Vec<TopProduct>,
}

/// An order containing at least one of the vendor's variants.
///
/// `vendor_total` only sums the vendor's own lines.
#[derive(Debug, Clone, Serialize)]
pub struct VendorOrder {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub vendor_total: Price,
    pub units: u64,
    pub created_at: DateTime<Utc>,
}

/// Count of entities per status or role.
#[derive(Debug, Clone, Serialize)]
pub struct CountBy<K> {
    pub key: K,
    pub count: u64,
}

/// Global figures for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub users: u64,
    pub users_by_role: Vec<CountBy<Role>>,
    pub products: u64,
    pub orders: u64,
    pub orders_by_status: Vec<CountBy<OrderStatus>>,
    pub revenue: Price,
    pub refunded: Price,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_period_parsing() {
        let period: SalesPeriod = serde_json::from_str("\"week\"").unwrap();
        assert_eq!(period, SalesPeriod::Week);
        assert_eq!(period.as_sql(), "week");
        assert!(serde_json::from_str::<SalesPeriod>("\"year\"").is_err());
    }
}
