//! Catalog endpoints.
//!
//! Listing and detail are public. Writes need a vendor who owns the product,
//! or an admin.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};

use boutique_core::{ProductId, VariantId};

use crate::db::products::{NewProduct, NewVariant, ProductFilter, ProductUpdate, VariantUpdate};
use crate::error::Result;
use crate::middleware::RequireVendor;
use crate::models::{PageParams, Paginated, Product, ProductDetail, Variant};
use crate::routes::extract::{Json, Query};
use crate::services::catalog::CatalogService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list).post(create))
        .route("/products/{id}", get(show).put(update).delete(delete))
        .route("/products/{id}/variants", post(add_variant))
        .route("/variants/{id}", put(update_variant).delete(delete_variant))
}

async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
    Query(params): Query<PageParams>,
) -> Result<Json<Paginated<Product>>> {
    Ok(Json(
        CatalogService::new(state.pool()).list(&filter, params).await?,
    ))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    Ok(Json(CatalogService::new(state.pool()).get(id).await?))
}

async fn create(
    RequireVendor(user): RequireVendor,
    State(state): State<AppState>,
    Json(product): Json<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let product = CatalogService::new(state.pool())
        .create(&user, None, &product)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update(
    RequireVendor(user): RequireVendor,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(update): Json<ProductUpdate>,
) -> Result<Json<Product>> {
    Ok(Json(
        CatalogService::new(state.pool())
            .update(&user, id, &update)
            .await?,
    ))
}

async fn delete(
    RequireVendor(user): RequireVendor,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    CatalogService::new(state.pool()).delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_variant(
    RequireVendor(user): RequireVendor,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(variant): Json<NewVariant>,
) -> Result<(StatusCode, Json<Variant>)> {
    let variant = CatalogService::new(state.pool())
        .add_variant(&user, id, &variant)
        .await?;
    Ok((StatusCode::CREATED, Json(variant)))
}

async fn update_variant(
    RequireVendor(user): RequireVendor,
    State(state): State<AppState>,
    Path(id): Path<VariantId>,
    Json(update): Json<VariantUpdate>,
) -> Result<Json<Variant>> {
    Ok(Json(
        CatalogService::new(state.pool())
            .update_variant(&user, id, &update)
            .await?,
    ))
}

async fn delete_variant(
    RequireVendor(user): RequireVendor,
    State(state): State<AppState>,
    Path(id): Path<VariantId>,
) -> Result<StatusCode> {
    CatalogService::new(state.pool())
        .delete_variant(&user, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
