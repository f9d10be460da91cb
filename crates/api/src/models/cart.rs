//! Cart and favorites.

use chrono::{DateTime, Utc};
use serde::Serialize;

use boutique_core::{CartItemId, FavoriteId, Price, ProductId, VariantId};

/// One line of a user's cart, joined with catalog data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub quantity: u32,
    /// Current effective unit price (not frozen until an order is placed).
    pub unit_price: Price,
    pub line_total: Price,
    /// Units currently in stock.
    pub stock: u32,
}

/// A user's cart.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub total: Price,
}

/// A product the user marked as favorite.
#[derive(Debug, Clone, Serialize)]
pub struct Favorite {
    pub id: FavoriteId,
    pub product_id: ProductId,
    pub product_name: String,
    pub price: Price,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
