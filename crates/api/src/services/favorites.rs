//! Favorite products.

use sqlx::PgPool;

use boutique_core::{ProductId, UserId};

use crate::db::{FavoriteRepository, RepositoryError};
use crate::error::{AppError, Result};
use crate::models::Favorite;

/// Favorites service.
pub struct FavoriteService<'a> {
    favorites: FavoriteRepository<'a>,
}

impl<'a> FavoriteService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            favorites: FavoriteRepository::new(pool),
        }
    }

    /// The user's favorites, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Favorite>> {
        Ok(self.favorites.list(user_id).await?)
    }

    /// Mark a product as favorite.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product doesn't exist.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<Favorite> {
        self.favorites
            .add(user_id, product_id)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    AppError::NotFound(format!("product {product_id} not found"))
                }
                other => other.into(),
            })
    }

    /// Remove a favorite.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` with `NotFound` if it wasn't a favorite.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<()> {
        Ok(self.favorites.remove(user_id, product_id).await?)
    }
}
