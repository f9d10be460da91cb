//! Shopping cart service.
//!
//! Cart lines carry the current variant price. Prices are only frozen when an
//! order is placed.

use sqlx::PgPool;
use tracing::instrument;

use boutique_core::{CartItemId, Price, UserId, VariantId};

use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, Result};
use crate::models::{Cart, CartItem};

/// Cart service.
pub struct CartService<'a> {
    cart: CartRepository<'a>,
    products: ProductRepository<'a>,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            cart: CartRepository::new(pool),
            products: ProductRepository::new(pool),
        }
    }

    /// The user's cart with its total.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Cart> {
        let items = self.cart.items(user_id).await?;
        let total = cart_total(&items)?;
        Ok(Cart { items, total })
    }

    /// Add units of a variant, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the variant doesn't exist.
    /// Returns `AppError::BadRequest` if the quantity is below 1 or the cart
    /// would hold more units than are in stock.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: UserId, variant_id: VariantId, quantity: i32) -> Result<Cart> {
        let quantity = positive_quantity(quantity)?;

        let variant = self
            .products
            .get_variant(variant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("variant {variant_id} not found")))?;

        let in_cart = self.cart.quantity_of(user_id, variant_id).await?;
        ensure_stock(in_cart.saturating_add(quantity), variant.stock)?;

        self.cart.add(user_id, variant_id, to_i32(quantity)).await?;
        self.get(user_id).await
    }

    /// Set the quantity of one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the user has no such line.
    /// Returns `AppError::BadRequest` if the quantity is below 1 or above stock.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<Cart> {
        let quantity = positive_quantity(quantity)?;

        let item = self
            .cart
            .get(user_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("cart item {id} not found")))?;
        ensure_stock(quantity, item.stock)?;

        self.cart.set_quantity(user_id, id, to_i32(quantity)).await?;
        self.get(user_id).await
    }

    /// Remove one of the user's lines.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` with `NotFound` if the user has no such line.
    pub async fn remove(&self, user_id: UserId, id: CartItemId) -> Result<Cart> {
        self.cart.remove(user_id, id).await?;
        self.get(user_id).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<()> {
        Ok(self.cart.clear(user_id).await?)
    }
}

fn cart_total(items: &[CartItem]) -> Result<Price> {
    items
        .iter()
        .try_fold(Price::ZERO, |total, item| total.checked_add(item.line_total))
        .map_err(AppError::from)
}

fn positive_quantity(quantity: i32) -> Result<u32> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| AppError::BadRequest("quantity must be at least 1".to_string()))
}

fn ensure_stock(wanted: u32, stock: u32) -> Result<()> {
    if wanted > stock {
        return Err(AppError::BadRequest(format!(
            "only {stock} unit(s) in stock"
        )));
    }
    Ok(())
}

// Quantities come from an `i32` and are bounded by stock, which is an `i32` column.
fn to_i32(quantity: u32) -> i32 {
    i32::try_from(quantity).unwrap_or(i32::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use boutique_core::ProductId;

    use super::*;

    fn item(cents: i64, quantity: u32) -> CartItem {
        let unit_price = Price::from_cents(cents).unwrap();
        CartItem {
            id: CartItemId::new(1),
            variant_id: VariantId::new(1),
            product_id: ProductId::new(1),
            product_name: "Tote".to_string(),
            image_url: None,
            color: None,
            size: None,
            quantity,
            unit_price,
            line_total: unit_price.times(quantity).unwrap(),
            stock: 10,
        }
    }

    #[test]
    fn test_cart_total() {
        assert_eq!(cart_total(&[]).unwrap(), Price::ZERO);
        assert_eq!(
            cart_total(&[item(1250, 2), item(399, 1)]).unwrap(),
            Price::from_cents(2899).unwrap()
        );
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert!(matches!(positive_quantity(0), Err(AppError::BadRequest(_))));
        assert!(matches!(positive_quantity(-3), Err(AppError::BadRequest(_))));
        assert_eq!(positive_quantity(2).unwrap(), 2);
    }

    #[test]
    fn test_stock_limit() {
        assert!(ensure_stock(5, 5).is_ok());
        assert!(matches!(ensure_stock(6, 5), Err(AppError::BadRequest(_))));
    }
}
