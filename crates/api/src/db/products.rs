//! Product and variant repository.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use boutique_core::{Price, ProductId, UserId, VariantId, VendorId};

use super::{RepositoryError, to_u32, to_u64};
use crate::models::{Product, Variant};

const PRODUCT_COLUMNS: &str =
    "id, vendor_id, name, description, price, image_url, category, created_at, updated_at";
const VARIANT_COLUMNS: &str =
    "id, product_id, color, size, stock, price, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: i32,
    vendor_id: i32,
    name: String,
    description: Option<String>,
    price: Price,
    image_url: Option<String>,
    category: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: ProductId::new(r.id),
            vendor_id: VendorId::new(r.vendor_id),
            name: r.name,
            description: r.description,
            price: r.price,
            image_url: r.image_url,
            category: r.category,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    id: i32,
    product_id: i32,
    color: Option<String>,
    size: Option<String>,
    stock: i32,
    price: Option<Price>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VariantRow> for Variant {
    type Error = RepositoryError;

    fn try_from(r: VariantRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: VariantId::new(r.id),
            product_id: ProductId::new(r.product_id),
            color: r.color,
            size: r.size,
            stock: to_u32(r.stock, "stock")?,
            price: r.price,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

/// A variant with its effective unit price, as needed to price an order.
#[derive(Debug, Clone)]
pub struct PricedVariant {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub stock: u32,
    pub unit_price: Price,
}

#[derive(sqlx::FromRow)]
struct PricedVariantRow {
    variant_id: i32,
    product_id: i32,
    product_name: String,
    stock: i32,
    unit_price: Price,
}

/// Catalog listing filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Case-insensitive substring of the name.
    pub search: Option<String>,
    pub vendor_id: Option<VendorId>,
    pub category: Option<String>,
}

/// Fields of a new product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

/// Product fields to change. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub image_url: Option<String>,
    pub category: Option<String>,
}

/// Fields of a new variant.
#[derive(Debug, Clone, Deserialize)]
pub struct NewVariant {
    pub color: Option<String>,
    pub size: Option<String>,
    pub stock: u32,
    pub price: Option<Price>,
}

/// Variant fields to change. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantUpdate {
    pub color: Option<String>,
    pub size: Option<String>,
    pub stock: Option<u32>,
    pub price: Option<Price>,
    /// Drop the price override so the product price applies again.
    #[serde(default)]
    pub clear_price: bool,
}

/// Repository for products and their variants.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// List products matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Product>, u64), RepositoryError> {
        const WHERE: &str = r"
            WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
              AND ($2::int IS NULL OR vendor_id = $2)
              AND ($3::text IS NULL OR category = $3)
        ";

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products {WHERE} ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        ))
        .bind(filter.search.as_deref())
        .bind(filter.vendor_id)
        .bind(filter.category.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products {WHERE}"))
            .bind(filter.search.as_deref())
            .bind(filter.vendor_id)
            .bind(filter.category.as_deref())
            .fetch_one(self.pool)
            .await?;

        Ok((
            rows.into_iter().map(Product::from).collect(),
            to_u64(total, "product count")?,
        ))
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// The user who owns a product through its vendor profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn owner_of(&self, id: ProductId) -> Result<Option<UserId>, RepositoryError> {
        let owner: Option<i32> = sqlx::query_scalar(
            "SELECT v.user_id FROM products p JOIN vendors v ON v.id = p.vendor_id WHERE p.id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(owner.map(UserId::new))
    }

    /// Insert a product for a vendor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the vendor doesn't exist.
    pub async fn create(
        &self,
        vendor_id: VendorId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products (vendor_id, name, description, price, image_url, category)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(vendor_id)
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price)
        .bind(product.image_url.as_deref())
        .bind(product.category.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "unknown vendor"))?;

        Ok(row.into())
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    pub async fn update(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            UPDATE products
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                price = COALESCE($4, price),
                image_url = COALESCE($5, image_url),
                category = COALESCE($6, category),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .bind(update.price)
        .bind(update.image_url.as_deref())
        .bind(update.category.as_deref())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    /// Delete a product and its variants.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    /// Returns `RepositoryError::Conflict` if one of its variants has been ordered.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_constraint(e, "product has been ordered"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    // =========================================================================
    // Variants
    // =========================================================================

    /// List the variants of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn variants_of(&self, product_id: ProductId) -> Result<Vec<Variant>, RepositoryError> {
        let rows = sqlx::query_as::<_, VariantRow>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE product_id = $1 ORDER BY id"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Variant::try_from).collect()
    }

    /// Get a variant by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_variant(&self, id: VariantId) -> Result<Option<Variant>, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(Variant::try_from).transpose()
    }

    /// The user who owns a variant through its product's vendor.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn owner_of_variant(&self, id: VariantId) -> Result<Option<UserId>, RepositoryError> {
        let owner: Option<i32> = sqlx::query_scalar(
            r"
            SELECT v.user_id
            FROM product_variants pv
            JOIN products p ON p.id = pv.product_id
            JOIN vendors v ON v.id = p.vendor_id
            WHERE pv.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(owner.map(UserId::new))
    }

    /// Insert a variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the product doesn't exist.
    pub async fn create_variant(
        &self,
        product_id: ProductId,
        variant: &NewVariant,
    ) -> Result<Variant, RepositoryError> {
        let stock = stock_column(variant.stock)?;

        let row = sqlx::query_as::<_, VariantRow>(&format!(
            r"
            INSERT INTO product_variants (product_id, color, size, stock, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {VARIANT_COLUMNS}
            "
        ))
        .bind(product_id)
        .bind(variant.color.as_deref())
        .bind(variant.size.as_deref())
        .bind(stock)
        .bind(variant.price)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::from_constraint(e, "unknown product"))?;

        Variant::try_from(row)
    }

    /// Update a variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant doesn't exist.
    pub async fn update_variant(
        &self,
        id: VariantId,
        update: &VariantUpdate,
    ) -> Result<Variant, RepositoryError> {
        let stock = update.stock.map(stock_column).transpose()?;

        let row = sqlx::query_as::<_, VariantRow>(&format!(
            r"
            UPDATE product_variants
            SET color = COALESCE($2, color),
                size = COALESCE($3, size),
                stock = COALESCE($4, stock),
                price = CASE WHEN $6 THEN NULL ELSE COALESCE($5, price) END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {VARIANT_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.color.as_deref())
        .bind(update.size.as_deref())
        .bind(stock)
        .bind(update.price)
        .bind(update.clear_price)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Variant::try_from(row)
    }

    /// Delete a variant.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the variant doesn't exist.
    /// Returns `RepositoryError::Conflict` if the variant has been ordered.
    pub async fn delete_variant(&self, id: VariantId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM product_variants WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await
            .map_err(|e| RepositoryError::from_constraint(e, "variant has been ordered"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    // =========================================================================
    // Stock
    // =========================================================================

    /// Load variants with their effective unit price, inside a transaction.
    ///
    /// Unknown IDs are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn priced_variants_in(
        conn: &mut PgConnection,
        ids: &[VariantId],
    ) -> Result<Vec<PricedVariant>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(VariantId::as_i32).collect();

        let rows = sqlx::query_as::<_, PricedVariantRow>(
            r"
            SELECT pv.id AS variant_id,
                   p.id AS product_id,
                   p.name AS product_name,
                   pv.stock,
                   COALESCE(pv.price, p.price) AS unit_price
            FROM product_variants pv
            JOIN products p ON p.id = pv.product_id
            WHERE pv.id = ANY($1)
            ",
        )
        .bind(&ids)
        .fetch_all(conn)
        .await?;

        rows.into_iter()
            .map(|r| {
                Ok(PricedVariant {
                    variant_id: VariantId::new(r.variant_id),
                    product_id: ProductId::new(r.product_id),
                    product_name: r.product_name,
                    stock: to_u32(r.stock, "stock")?,
                    unit_price: r.unit_price,
                })
            })
            .collect()
    }

    /// Decrement stock only if enough units remain.
    ///
    /// Returns `false` (and changes nothing) when the variant has fewer than
    /// `quantity` units, so concurrent confirmations can never oversell.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn decrement_stock_in(
        conn: &mut PgConnection,
        id: VariantId,
        quantity: u32,
    ) -> Result<bool, RepositoryError> {
        let quantity = i32::try_from(quantity)
            .map_err(|_| RepositoryError::DataCorruption(format!("quantity overflow: {quantity}")))?;

        let result = sqlx::query(
            r"
            UPDATE product_variants
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            ",
        )
        .bind(id)
        .bind(quantity)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Stock as stored in an `INTEGER` column.
fn stock_column(stock: u32) -> Result<i32, RepositoryError> {
    i32::try_from(stock)
        .map_err(|_| RepositoryError::OutOfRange(format!("stock {stock} is too large")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_column_bounds() {
        assert_eq!(stock_column(12).unwrap(), 12);
        assert_eq!(stock_column(2_147_483_647).unwrap(), i32::MAX);
        assert!(matches!(
            stock_column(u32::MAX),
            Err(RepositoryError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_variant_update_price_override() {
        let update: VariantUpdate = serde_json::from_str(r#"{"clear_price": true}"#).unwrap();
        assert!(update.clear_price);
        assert!(update.price.is_none());

        let update: VariantUpdate = serde_json::from_str(r#"{"price": "12.50"}"#).unwrap();
        assert!(!update.clear_price);
        assert_eq!(update.price, Some(Price::from_cents(1250).unwrap()));
    }
}
