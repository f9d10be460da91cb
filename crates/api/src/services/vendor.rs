//! Vendor analytics.
//!
//! Figures only count orders that were paid (`Payé` or a later shipping
//! status) and only the vendor's own lines within them.

use chrono::{DateTime, Duration, Months, Utc};
use sqlx::PgPool;

use boutique_core::{UserId, VendorId};

use crate::db::{AnalyticsRepository, VendorRepository};
use crate::error::{AppError, Result};
use crate::models::{PageParams, Paginated, SalesPeriod, SalesPoint, VendorDashboard, VendorOrder};

/// Best sellers shown on the dashboard.
const TOP_PRODUCTS: i64 = 5;

/// Vendor analytics service.
pub struct VendorService<'a> {
    analytics: AnalyticsRepository<'a>,
    vendors: VendorRepository<'a>,
}

impl<'a> VendorService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            analytics: AnalyticsRepository::new(pool),
            vendors: VendorRepository::new(pool),
        }
    }

    /// Headline figures and best sellers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user has no vendor profile.
    pub async fn dashboard(&self, user_id: UserId) -> Result<VendorDashboard> {
        let vendor_id = self.vendor_id(user_id).await?;
        Ok(self.analytics.vendor_dashboard(vendor_id, TOP_PRODUCTS).await?)
    }

    /// Sales series bucketed by `period`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user has no vendor profile.
    pub async fn sales(&self, user_id: UserId, period: SalesPeriod) -> Result<Vec<SalesPoint>> {
        let vendor_id = self.vendor_id(user_id).await?;
        Ok(self
            .analytics
            .sales(Some(vendor_id), period, window_start(period, Utc::now()))
            .await?)
    }

    /// Orders containing the vendor's variants, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user has no vendor profile.
    pub async fn orders(&self, user_id: UserId, params: PageParams) -> Result<Paginated<VendorOrder>> {
        let vendor_id = self.vendor_id(user_id).await?;
        let (items, total) = self
            .analytics
            .vendor_orders(vendor_id, params.limit(), params.offset())
            .await?;
        Ok(Paginated::new(items, params, total))
    }

    async fn vendor_id(&self, user_id: UserId) -> Result<VendorId> {
        self.vendors
            .get_by_user(user_id)
            .await?
            .map(|vendor| vendor.id)
            .ok_or_else(|| AppError::NotFound("vendor profile not found".to_string()))
    }
}

/// Start of the reporting window: 30 days, 12 weeks or 12 months back.
#[must_use]
pub fn window_start(period: SalesPeriod, now: DateTime<Utc>) -> DateTime<Utc> {
    match period {
        SalesPeriod::Day => now - Duration::days(30),
        SalesPeriod::Week => now - Duration::weeks(12),
        SalesPeriod::Month => now
            .checked_sub_months(Months::new(12))
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_window_start() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();

        assert_eq!(
            window_start(SalesPeriod::Day, now),
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            window_start(SalesPeriod::Week, now),
            Utc.with_ymd_and_hms(2024, 1, 7, 12, 0, 0).unwrap()
        );
        assert_eq!(
            window_start(SalesPeriod::Month, now),
            Utc.with_ymd_and_hms(2023, 3, 31, 12, 0, 0).unwrap()
        );
    }
}
