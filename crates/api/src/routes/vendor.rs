//! Vendor dashboard.

use axum::{Router, extract::State, routing::get};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::RequireVendor;
use crate::models::{PageParams, Paginated, SalesPeriod, SalesPoint, VendorDashboard, VendorOrder};
use crate::routes::extract::{Json, Query};
use crate::services::vendor::VendorService;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/sales", get(sales))
        .route("/orders", get(orders))
}

/// `?period=day|week|month`, daily by default.
#[derive(Debug, Default, Deserialize)]
pub struct SalesQuery {
    #[serde(default)]
    pub period: SalesPeriod,
}

async fn dashboard(
    RequireVendor(user): RequireVendor,
    State(state): State<AppState>,
) -> Result<Json<VendorDashboard>> {
    Ok(Json(VendorService::new(state.pool()).dashboard(user.id).await?))
}

async fn sales(
    RequireVendor(user): RequireVendor,
    State(state): State<AppState>,
    Query(query): Query<SalesQuery>,
) -> Result<Json<Vec<SalesPoint>>> {
    Ok(Json(
        VendorService::new(state.pool())
            .sales(user.id, query.period)
            .await?,
    ))
}

async fn orders(
    RequireVendor(user): RequireVendor,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Paginated<VendorOrder>>> {
    Ok(Json(
        VendorService::new(state.pool()).orders(user.id, params).await?,
    ))
}
