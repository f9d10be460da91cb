//! Aggregate queries for the vendor and admin dashboards.
//!
//! Revenue is computed from order lines (`quantity * unit_price`) of orders
//! in a paid status, so a vendor only sees the share of mixed orders that
//! belongs to their own variants.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use boutique_core::{OrderId, OrderStatus, Price, ProductId, Role, VendorId};

use super::{RepositoryError, to_u64};
use crate::models::{
    AdminStats, CountBy, SalesPeriod, SalesPoint, TopProduct, VendorDashboard, VendorOrder,
};

/// SQL predicate on `o.status` for orders that count as revenue.
const PAID_STATUSES: &str = "o.status IN ('Payé', 'Expédiée', 'Livrée')";

#[derive(sqlx::FromRow)]
struct TotalsRow {
    revenue: Price,
    paid_orders: i64,
    units_sold: i64,
}

#[derive(sqlx::FromRow)]
struct TopProductRow {
    product_id: i32,
    name: String,
    units_sold: i64,
    revenue: Price,
}

impl TryFrom<TopProductRow> for TopProduct {
    type Error = RepositoryError;

    fn try_from(r: TopProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            product_id: ProductId::new(r.product_id),
            name: r.name,
            units_sold: to_u64(r.units_sold, "units sold")?,
            revenue: r.revenue,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SalesPointRow {
    period: DateTime<Utc>,
    revenue: Price,
    orders: i64,
}

impl TryFrom<SalesPointRow> for SalesPoint {
    type Error = RepositoryError;

    fn try_from(r: SalesPointRow) -> Result<Self, Self::Error> {
        Ok(Self {
            period: r.period,
            revenue: r.revenue,
            orders: to_u64(r.orders, "order count")?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VendorOrderRow {
    order_id: i32,
    status: OrderStatus,
    vendor_total: Price,
    units: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<VendorOrderRow> for VendorOrder {
    type Error = RepositoryError;

    fn try_from(r: VendorOrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            order_id: OrderId::new(r.order_id),
            status: r.status,
            vendor_total: r.vendor_total,
            units: to_u64(r.units, "units")?,
            created_at: r.created_at,
        })
    }
}

/// Read-only repository for dashboard figures.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    /// Create a new analytics repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Headline figures for a vendor, with their `top` best-selling products.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn vendor_dashboard(
        &self,
        vendor_id: VendorId,
        top: i64,
    ) -> Result<VendorDashboard, RepositoryError> {
        let totals = sqlx::query_as::<_, TotalsRow>(&format!(
            r"
            SELECT COALESCE(SUM(ov.quantity * ov.unit_price), 0) AS revenue,
                   COUNT(DISTINCT o.id) AS paid_orders,
                   COALESCE(SUM(ov.quantity), 0)::BIGINT AS units_sold
            FROM order_variants ov
            JOIN orders o ON o.id = ov.order_id
            JOIN product_variants pv ON pv.id = ov.variant_id
            JOIN products p ON p.id = pv.product_id
            WHERE p.vendor_id = $1 AND {PAID_STATUSES}
            "
        ))
        .bind(vendor_id)
        .fetch_one(self.pool)
        .await?;

        let product_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE vendor_id = $1")
                .bind(vendor_id)
                .fetch_one(self.pool)
                .await?;

        let top_products = self.top_products(Some(vendor_id), top).await?;

        Ok(VendorDashboard {
            revenue: totals.revenue,
            paid_orders: to_u64(totals.paid_orders, "paid orders")?,
            units_sold: to_u64(totals.units_sold, "units sold")?,
            product_count: to_u64(product_count, "product count")?,
            top_products,
        })
    }

    /// Best-selling products by units, for one vendor or the whole shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(
        &self,
        vendor_id: Option<VendorId>,
        limit: i64,
    ) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, TopProductRow>(&format!(
            r"
            SELECT p.id AS product_id, p.name,
                   SUM(ov.quantity)::BIGINT AS units_sold,
                   SUM(ov.quantity * ov.unit_price) AS revenue
            FROM order_variants ov
            JOIN orders o ON o.id = ov.order_id
            JOIN product_variants pv ON pv.id = ov.variant_id
            JOIN products p ON p.id = pv.product_id
            WHERE ($1::INT IS NULL OR p.vendor_id = $1) AND {PAID_STATUSES}
            GROUP BY p.id, p.name
            ORDER BY units_sold DESC, p.id
            LIMIT $2
            "
        ))
        .bind(vendor_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TopProduct::try_from).collect()
    }

    /// Revenue and order count per period since `since`, for one vendor or
    /// the whole shop. Empty periods are omitted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn sales(
        &self,
        vendor_id: Option<VendorId>,
        period: SalesPeriod,
        since: DateTime<Utc>,
    ) -> Result<Vec<SalesPoint>, RepositoryError> {
        let rows = sqlx::query_as::<_, SalesPointRow>(&format!(
            r"
            SELECT date_trunc($2, o.created_at) AS period,
                   SUM(ov.quantity * ov.unit_price) AS revenue,
                   COUNT(DISTINCT o.id) AS orders
            FROM order_variants ov
            JOIN orders o ON o.id = ov.order_id
            JOIN product_variants pv ON pv.id = ov.variant_id
            JOIN products p ON p.id = pv.product_id
            WHERE ($1::INT IS NULL OR p.vendor_id = $1)
              AND o.created_at >= $3
              AND {PAID_STATUSES}
            GROUP BY 1
            ORDER BY 1
            "
        ))
        .bind(vendor_id)
        .bind(period.as_sql())
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(SalesPoint::try_from).collect()
    }

    /// Orders containing at least one of the vendor's variants, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn vendor_orders(
        &self,
        vendor_id: VendorId,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<VendorOrder>, u64), RepositoryError> {
        let rows = sqlx::query_as::<_, VendorOrderRow>(
            r"
            SELECT o.id AS order_id, o.status, o.created_at,
                   SUM(ov.quantity * ov.unit_price) AS vendor_total,
                   SUM(ov.quantity)::BIGINT AS units
            FROM order_variants ov
            JOIN orders o ON o.id = ov.order_id
            JOIN product_variants pv ON pv.id = ov.variant_id
            JOIN products p ON p.id = pv.product_id
            WHERE p.vendor_id = $1
            GROUP BY o.id, o.status, o.created_at
            ORDER BY o.created_at DESC, o.id DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(vendor_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(DISTINCT ov.order_id)
            FROM order_variants ov
            JOIN product_variants pv ON pv.id = ov.variant_id
            JOIN products p ON p.id = pv.product_id
            WHERE p.vendor_id = $1
            ",
        )
        .bind(vendor_id)
        .fetch_one(self.pool)
        .await?;

        let orders = rows
            .into_iter()
            .map(VendorOrder::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((orders, to_u64(total, "vendor order count")?))
    }

    /// Global figures for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn admin_stats(&self) -> Result<AdminStats, RepositoryError> {
        let users_by_role: Vec<(Role, i64)> =
            sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")
                .fetch_all(self.pool)
                .await?;

        let orders_by_status: Vec<(OrderStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status ORDER BY status")
                .fetch_all(self.pool)
                .await?;

        let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(self.pool)
            .await?;

        let revenue: Price = sqlx::query_scalar(&format!(
            "SELECT COALESCE(SUM(o.total_price), 0) FROM orders o WHERE {PAID_STATUSES}"
        ))
        .fetch_one(self.pool)
        .await?;

        let refunded: Price = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE status = 'Remboursé'",
        )
        .fetch_one(self.pool)
        .await?;

        let users_by_role = users_by_role
            .into_iter()
            .map(|(key, count)| Ok(CountBy { key, count: to_u64(count, "user count")? }))
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        let orders_by_status = orders_by_status
            .into_iter()
            .map(|(key, count)| Ok(CountBy { key, count: to_u64(count, "order count")? }))
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        Ok(AdminStats {
            users: users_by_role.iter().map(|c| c.count).sum(),
            orders: orders_by_status.iter().map(|c| c.count).sum(),
            users_by_role,
            products: to_u64(products, "product count")?,
            orders_by_status,
            revenue,
            refunded,
        })
    }
}
