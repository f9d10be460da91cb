//! Vendor profile repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use boutique_core::{UserId, VendorId};

use super::RepositoryError;
use crate::models::Vendor;

#[derive(sqlx::FromRow)]
struct VendorRow {
    id: i32,
    user_id: i32,
    shop_name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<VendorRow> for Vendor {
    fn from(r: VendorRow) -> Self {
        Self {
            id: VendorId::new(r.id),
            user_id: UserId::new(r.user_id),
            shop_name: r.shop_name,
            description: r.description,
            created_at: r.created_at,
        }
    }
}

/// Repository for vendor profiles.
pub struct VendorRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> VendorRepository<'a> {
    /// Create a new vendor repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the vendor profile of a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_user(&self, user_id: UserId) -> Result<Option<Vendor>, RepositoryError> {
        let row = sqlx::query_as::<_, VendorRow>(
            "SELECT id, user_id, shop_name, description, created_at FROM vendors WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Vendor::from))
    }

    /// Check that a vendor exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: VendorId) -> Result<bool, RepositoryError> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM vendors WHERE id = $1)")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        Ok(found)
    }

    /// Create a vendor profile unless the user already has one.
    ///
    /// Returns the existing profile when there is one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn ensure_in(
        conn: &mut PgConnection,
        user_id: UserId,
        shop_name: &str,
        description: Option<&str>,
    ) -> Result<Vendor, RepositoryError> {
        let row = sqlx::query_as::<_, VendorRow>(
            r"
            INSERT INTO vendors (user_id, shop_name, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING id, user_id, shop_name, description, created_at
            ",
        )
        .bind(user_id)
        .bind(shop_name)
        .bind(description)
        .fetch_one(conn)
        .await?;

        Ok(row.into())
    }
}
