//! Cart repository.

use sqlx::{PgConnection, PgPool};

use boutique_core::{CartItemId, Price, ProductId, UserId, VariantId};

use super::{RepositoryError, to_u32};
use crate::models::CartItem;

const CART_SELECT: &str = r"
    SELECT ci.id, ci.variant_id, p.id AS product_id, p.name AS product_name, p.image_url,
           pv.color, pv.size, ci.quantity, pv.stock,
           COALESCE(pv.price, p.price) AS unit_price
    FROM cart_items ci
    JOIN product_variants pv ON pv.id = ci.variant_id
    JOIN products p ON p.id = pv.product_id
";

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    variant_id: i32,
    product_id: i32,
    product_name: String,
    image_url: Option<String>,
    color: Option<String>,
    size: Option<String>,
    quantity: i32,
    stock: i32,
    unit_price: Price,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(r: CartItemRow) -> Result<Self, Self::Error> {
        let quantity = to_u32(r.quantity, "quantity")?;
        let line_total = r
            .unit_price
            .times(quantity)
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Self {
            id: CartItemId::new(r.id),
            variant_id: VariantId::new(r.variant_id),
            product_id: ProductId::new(r.product_id),
            product_name: r.product_name,
            image_url: r.image_url,
            color: r.color,
            size: r.size,
            quantity,
            unit_price: r.unit_price,
            line_total,
            stock: to_u32(r.stock, "stock")?,
        })
    }
}

/// Repository for cart items.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a user's cart lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItemRow>(&format!(
            "{CART_SELECT} WHERE ci.user_id = $1 ORDER BY ci.created_at, ci.id"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(CartItem::try_from).collect()
    }

    /// Get one cart line owned by a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: CartItemId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            "{CART_SELECT} WHERE ci.user_id = $1 AND ci.id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(CartItem::try_from).transpose()
    }

    /// Quantity of a variant already in a user's cart (0 if absent).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn quantity_of(
        &self,
        user_id: UserId,
        variant_id: VariantId,
    ) -> Result<u32, RepositoryError> {
        let quantity: Option<i32> = sqlx::query_scalar(
            "SELECT quantity FROM cart_items WHERE user_id = $1 AND variant_id = $2",
        )
        .bind(user_id)
        .bind(variant_id)
        .fetch_optional(self.pool)
        .await?;

        quantity.map_or(Ok(0), |q| to_u32(q, "quantity"))
    }

    /// Add units of a variant, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the variant doesn't exist.
    pub async fn add(
        &self,
        user_id: UserId,
        variant_id: VariantId,
        quantity: i32,
    ) -> Result<CartItemId, RepositoryError> {
        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO cart_items (user_id, variant_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, variant_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity, updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(variant_id)
        .bind(quantity)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "unknown variant"))?;

        Ok(CartItemId::new(id))
    }

    /// Set the quantity of a line owned by a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such line.
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE cart_items SET quantity = $3, updated_at = NOW() WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Remove a line owned by a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user has no such line.
    pub async fn remove(&self, user_id: UserId, id: CartItemId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Empty a user's cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        Self::clear_in(&mut *conn, user_id).await
    }

    /// Empty a user's cart inside an existing transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear_in(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(conn)
            .await?;
        Ok(())
    }
}
