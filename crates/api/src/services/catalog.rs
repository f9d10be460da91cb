//! Product catalog service.
//!
//! Reads are public. Writes require a vendor who owns the product through
//! their vendor profile, or an admin.

use sqlx::PgPool;
use tracing::{info, instrument};

use boutique_core::{Price, ProductId, VariantId, VendorId};

use crate::db::products::{NewProduct, NewVariant, ProductFilter, ProductUpdate, VariantUpdate};
use crate::db::{ProductRepository, VendorRepository};
use crate::error::{AppError, Result};
use crate::models::{CurrentUser, PageParams, Paginated, Product, ProductDetail, Variant};

/// Catalog service.
pub struct CatalogService<'a> {
    products: ProductRepository<'a>,
    vendors: VendorRepository<'a>,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            products: ProductRepository::new(pool),
            vendors: VendorRepository::new(pool),
        }
    }

    /// A page of products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        params: PageParams,
    ) -> Result<Paginated<Product>> {
        let (items, total) = self
            .products
            .list(filter, params.limit(), params.offset())
            .await?;
        Ok(Paginated::new(items, params, total))
    }

    /// A product with its variants.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the product doesn't exist.
    pub async fn get(&self, id: ProductId) -> Result<ProductDetail> {
        let product = self
            .products
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;
        let variants = self.products.variants_of(id).await?;

        Ok(ProductDetail { product, variants })
    }

    /// Create a product for the caller's vendor profile.
    ///
    /// Admins must name the vendor explicitly.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` if the caller has no vendor profile, the
    /// named vendor doesn't exist, or the product is invalid.
    #[instrument(skip(self, product), fields(user_id = %user.id))]
    pub async fn create(
        &self,
        user: &CurrentUser,
        vendor_id: Option<VendorId>,
        product: &NewProduct,
    ) -> Result<Product> {
        validate_name(&product.name)?;
        validate_price(Some(product.price))?;

        let vendor_id = match vendor_id {
            Some(id) if user.is_admin() => {
                if !self.vendors.exists(id).await? {
                    return Err(AppError::BadRequest(format!("vendor {id} does not exist")));
                }
                id
            }
            _ => {
                self.vendors
                    .get_by_user(user.id)
                    .await?
                    .ok_or_else(|| {
                        AppError::BadRequest("a vendor profile is required to sell".to_string())
                    })?
                    .id
            }
        };

        let created = self.products.create(vendor_id, product).await?;
        info!(product_id = %created.id, vendor_id = %vendor_id, "Product created");

        Ok(created)
    }

    /// Update a product the caller owns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Forbidden`.
    #[instrument(skip(self, update), fields(user_id = %user.id))]
    pub async fn update(
        &self,
        user: &CurrentUser,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product> {
        if let Some(name) = &update.name {
            validate_name(name)?;
        }
        validate_price(update.price)?;
        self.authorize_product(user, id).await?;

        Ok(self.products.update(id, update).await?)
    }

    /// Delete a product the caller owns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` with a conflict if the product was ordered.
    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn delete(&self, user: &CurrentUser, id: ProductId) -> Result<()> {
        self.authorize_product(user, id).await?;
        self.products.delete(id).await?;

        info!(product_id = %id, "Product deleted");

        Ok(())
    }

    /// Add a variant to a product the caller owns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Forbidden`.
    #[instrument(skip(self, variant), fields(user_id = %user.id))]
    pub async fn add_variant(
        &self,
        user: &CurrentUser,
        product_id: ProductId,
        variant: &NewVariant,
    ) -> Result<Variant> {
        validate_price(variant.price)?;
        self.authorize_product(user, product_id).await?;
        Ok(self.products.create_variant(product_id, variant).await?)
    }

    /// Update a variant of a product the caller owns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Forbidden`, and
    /// `AppError::BadRequest` when a price is both set and cleared.
    #[instrument(skip(self, update), fields(user_id = %user.id))]
    pub async fn update_variant(
        &self,
        user: &CurrentUser,
        id: VariantId,
        update: &VariantUpdate,
    ) -> Result<Variant> {
        if update.clear_price && update.price.is_some() {
            return Err(AppError::BadRequest(
                "set a price or clear it, not both".to_string(),
            ));
        }
        validate_price(update.price)?;
        self.authorize_variant(user, id).await?;
        Ok(self.products.update_variant(id, update).await?)
    }

    /// Delete a variant of a product the caller owns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` with a conflict if the variant was ordered.
    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn delete_variant(&self, user: &CurrentUser, id: VariantId) -> Result<()> {
        self.authorize_variant(user, id).await?;
        Ok(self.products.delete_variant(id).await?)
    }

    async fn authorize_product(&self, user: &CurrentUser, id: ProductId) -> Result<()> {
        let owner = self
            .products
            .owner_of(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {id} not found")))?;
        ensure_owner(user, owner)
    }

    async fn authorize_variant(&self, user: &CurrentUser, id: VariantId) -> Result<()> {
        let owner = self
            .products
            .owner_of_variant(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("variant {id} not found")))?;
        ensure_owner(user, owner)
    }
}

fn ensure_owner(user: &CurrentUser, owner: boutique_core::UserId) -> Result<()> {
    if user.can_access(owner) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You can only manage your own products".to_string(),
        ))
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("product name cannot be empty".to_string()));
    }
    Ok(())
}

fn validate_price(price: Option<Price>) -> Result<()> {
    price.map(Price::unit).transpose()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use boutique_core::{PriceError, Role, UserId};

    use super::*;

    #[test]
    fn test_ownership() {
        let vendor = CurrentUser {
            id: UserId::new(4),
            role: Role::Vendor,
        };
        let admin = CurrentUser {
            id: UserId::new(1),
            role: Role::Admin,
        };

        assert!(ensure_owner(&vendor, UserId::new(4)).is_ok());
        assert!(matches!(
            ensure_owner(&vendor, UserId::new(5)),
            Err(AppError::Forbidden(_))
        ));
        assert!(ensure_owner(&admin, UserId::new(5)).is_ok());
    }

    #[test]
    fn test_blank_names_rejected() {
        assert!(validate_name("  ").is_err());
        assert!(validate_name("Sweat").is_ok());
    }

    #[test]
    fn test_catalog_price_bound() {
        assert!(validate_price(None).is_ok());
        assert!(validate_price(Some(Price::MAX_UNIT)).is_ok());

        let too_large = Price::from_cents(10_000_000_000).ok();
        assert!(matches!(
            validate_price(too_large),
            Err(AppError::Price(PriceError::Overflow))
        ));
    }
}
