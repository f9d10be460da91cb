//! Admin dashboard: global figures and user management.
//!
//! Product, order and payment administration reuse [`super::catalog`],
//! [`super::orders`] and [`super::payments`] with an admin caller.

use sqlx::PgPool;
use tracing::{info, instrument};

use boutique_core::{Role, UserId};

use crate::db::{AnalyticsRepository, UserRepository, VendorRepository};
use crate::error::{AppError, Result};
use crate::models::{AdminStats, CurrentUser, PageParams, Paginated, SalesPeriod, SalesPoint, User};
use crate::services::vendor::window_start;

/// Role change form.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RoleChange {
    pub role: Role,
    /// Shop name for a new vendor profile.
    pub shop_name: Option<String>,
}

/// Admin dashboard service.
pub struct AdminService<'a> {
    pool: &'a PgPool,
    analytics: AnalyticsRepository<'a>,
    users: UserRepository<'a>,
}

impl<'a> AdminService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            analytics: AnalyticsRepository::new(pool),
            users: UserRepository::new(pool),
        }
    }

    /// Global counters and revenue.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn stats(&self) -> Result<AdminStats> {
        Ok(self.analytics.admin_stats().await?)
    }

    /// Sales series across all vendors.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn sales(&self, period: SalesPeriod) -> Result<Vec<SalesPoint>> {
        Ok(self
            .analytics
            .sales(None, period, window_start(period, chrono::Utc::now()))
            .await?)
    }

    /// Users, newest first, optionally filtered by role.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn users(&self, role: Option<Role>, params: PageParams) -> Result<Paginated<User>> {
        let (items, total) = self
            .users
            .list(role, params.limit(), params.offset())
            .await?;
        Ok(Paginated::new(items, params, total))
    }

    /// Change a user's role. Promoting to vendor creates the shop profile.
    ///
    /// Existing access tokens keep their old role until they expire.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` with `NotFound` if the user doesn't exist.
    #[instrument(skip(self, change), fields(role = %change.role))]
    pub async fn set_role(&self, id: UserId, change: &RoleChange) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let user = UserRepository::set_role_in(&mut *tx, id, change.role).await?;
        if change.role == Role::Vendor {
            let shop_name = change
                .shop_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map_or_else(|| default_shop_name(&user), str::to_string);
            VendorRepository::ensure_in(&mut *tx, id, &shop_name, None).await?;
        }

        tx.commit().await?;

        info!(user_id = %id, "User role changed");

        Ok(user)
    }

    /// Delete a user and everything they own.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when admins try to delete themselves.
    #[instrument(skip(self), fields(admin_id = %admin.id))]
    pub async fn delete_user(&self, admin: &CurrentUser, id: UserId) -> Result<()> {
        if admin.id == id {
            return Err(AppError::BadRequest(
                "You cannot delete your own account from the admin dashboard".to_string(),
            ));
        }

        self.users.delete_cascade(id).await?;

        info!(user_id = %id, "User deleted by admin");

        Ok(())
    }
}

fn default_shop_name(user: &User) -> String {
    format!("Boutique de {}", user.email)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_change_form() {
        let change: RoleChange = serde_json::from_str(r#"{"role": "vendor"}"#).unwrap();
        assert_eq!(change.role, Role::Vendor);
        assert!(change.shop_name.is_none());

        assert!(serde_json::from_str::<RoleChange>(r#"{"role": "superuser"}"#).is_err());
    }
}
