//! Favorite products.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde::Deserialize;

use boutique_core::ProductId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::Favorite;
use crate::routes::extract::Json;
use crate::services::favorites::FavoriteService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(add))
        .route("/{product_id}", delete(remove))
}

#[derive(Debug, Deserialize)]
pub struct AddFavorite {
    pub product_id: ProductId,
}

async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<Favorite>>> {
    Ok(Json(FavoriteService::new(state.pool()).list(user.id).await?))
}

async fn add(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<AddFavorite>,
) -> Result<(StatusCode, Json<Favorite>)> {
    let favorite = FavoriteService::new(state.pool())
        .add(user.id, body.product_id)
        .await?;
    Ok((StatusCode::CREATED, Json(favorite)))
}

async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<StatusCode> {
    FavoriteService::new(state.pool())
        .remove(user.id, product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
