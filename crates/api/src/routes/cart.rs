//! Cart endpoints. Every route acts on the caller's own cart.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;

use boutique_core::{CartItemId, VariantId};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::Cart;
use crate::routes::extract::Json;
use crate::services::cart::CartService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(show).post(add).delete(clear))
        .route("/{item_id}", put(update).delete(remove))
}

/// Add to cart body.
#[derive(Debug, Deserialize)]
pub struct AddToCart {
    pub variant_id: VariantId,
    #[serde(default = "one")]
    pub quantity: i32,
}

/// Quantity update body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantity {
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

async fn show(RequireAuth(user): RequireAuth, State(state): State<AppState>) -> Result<Json<Cart>> {
    Ok(Json(CartService::new(state.pool()).get(user.id).await?))
}

async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<AddToCart>,
) -> Result<Json<Cart>> {
    Ok(Json(
        CartService::new(state.pool())
            .add(user.id, body.variant_id, body.quantity)
            .await?,
    ))
}

async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(item_id): Path<CartItemId>,
    Json(body): Json<UpdateQuantity>,
) -> Result<Json<Cart>> {
    Ok(Json(
        CartService::new(state.pool())
            .update_quantity(user.id, item_id, body.quantity)
            .await?,
    ))
}

async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<Cart>> {
    Ok(Json(
        CartService::new(state.pool()).remove(user.id, item_id).await?,
    ))
}

async fn clear(RequireAuth(user): RequireAuth, State(state): State<AppState>) -> Result<StatusCode> {
    CartService::new(state.pool()).clear(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
