//! Catalog domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use boutique_core::{Price, ProductId, VariantId, VendorId};

/// A product sold by a vendor.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub vendor_id: VendorId,
    pub name: String,
    pub description: Option<String>,
    /// Base price, used by variants without an override.
    pub price: Price,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A purchasable variant (color/size) of a product.
#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub color: Option<String>,
    pub size: Option<String>,
    pub stock: u32,
    /// Price override; `None` means the product price applies.
    pub price: Option<Price>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Variant {
    /// Effective unit price: the override if set, otherwise the product price.
    #[must_use]
    pub fn unit_price(&self, product_price: Price) -> Price {
        self.price.unwrap_or(product_price)
    }
}

/// A product with its variants.
#[derive(Debug, Clone, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<Variant>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_price_override() {
        let now = Utc::now();
        let mut variant = Variant {
            id: VariantId::new(1),
            product_id: ProductId::new(1),
            color: Some("rouge".to_string()),
            size: Some("M".to_string()),
            stock: 3,
            price: None,
            created_at: now,
            updated_at: now,
        };
        let base = Price::from_cents(2500).unwrap();

        assert_eq!(variant.unit_price(base), base);

        variant.price = Some(Price::from_cents(2999).unwrap());
        assert_eq!(variant.unit_price(base), Price::from_cents(2999).unwrap());
    }
}
