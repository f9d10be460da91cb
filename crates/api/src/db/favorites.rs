//! Favorites repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use boutique_core::{FavoriteId, Price, ProductId, UserId};

use super::RepositoryError;
use crate::models::Favorite;

#[derive(sqlx::FromRow)]
struct FavoriteRow {
    id: i32,
    product_id: i32,
    product_name: String,
    price: Price,
    image_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<FavoriteRow> for Favorite {
    fn from(r: FavoriteRow) -> Self {
        Self {
            id: FavoriteId::new(r.id),
            product_id: ProductId::new(r.product_id),
            product_name: r.product_name,
            price: r.price,
            image_url: r.image_url,
            created_at: r.created_at,
        }
    }
}

/// Repository for favorite products.
pub struct FavoriteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FavoriteRepository<'a> {
    /// Create a new favorites repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's favorites, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Favorite>, RepositoryError> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            r"
            SELECT f.id, f.product_id, p.name AS product_name, p.price, p.image_url, f.created_at
            FROM favorites f
            JOIN products p ON p.id = f.product_id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC, f.id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Favorite::from).collect())
    }

    /// Mark a product as favorite. Adding twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<Favorite, RepositoryError> {
        let row = sqlx::query_as::<_, FavoriteRow>(
            r"
            WITH inserted AS (
                INSERT INTO favorites (user_id, product_id)
                SELECT $1, id FROM products WHERE id = $2
                ON CONFLICT (user_id, product_id) DO UPDATE SET user_id = EXCLUDED.user_id
                RETURNING id, product_id, created_at
            )
            SELECT i.id, i.product_id, p.name AS product_name, p.price, p.image_url, i.created_at
            FROM inserted i
            JOIN products p ON p.id = i.product_id
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Remove a favorite.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product wasn't a favorite.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
