//! Customer order endpoints.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};

use boutique_core::OrderId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{Order, OrderDetail, PageParams, Paginated};
use crate::routes::extract::{Json, Query};
use crate::services::orders::{OrderService, PlaceOrder};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(place))
        .route("/{id}", get(show))
        .route("/{id}/cancel", put(cancel))
}

async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Paginated<Order>>> {
    Ok(Json(
        OrderService::new(state.pool()).list_own(user.id, params).await?,
    ))
}

async fn place(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(form): Json<PlaceOrder>,
) -> Result<(StatusCode, Json<OrderDetail>)> {
    let order = OrderService::new(state.pool()).place(user.id, &form).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn show(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(OrderService::new(state.pool()).get(&user, id).await?))
}

async fn cancel(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(OrderService::new(state.pool()).cancel(&user, id).await?))
}
