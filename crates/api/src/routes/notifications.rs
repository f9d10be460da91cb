//! Notification inbox.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
};
use serde::Serialize;

use boutique_core::NotificationId;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::{Notification, PageParams};
use crate::routes::extract::{Json, Query};
use crate::services::notifications::{Inbox, NotificationService};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(inbox))
        .route("/read-all", put(mark_all_read))
        .route("/{id}/read", put(mark_read))
        .route("/{id}", delete(remove))
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

async fn inbox(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Inbox>> {
    Ok(Json(
        NotificationService::new(state.pool()).inbox(user.id, params).await?,
    ))
}

async fn mark_read(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<Json<Notification>> {
    Ok(Json(
        NotificationService::new(state.pool()).mark_read(user.id, id).await?,
    ))
}

async fn mark_all_read(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<MarkedRead>> {
    let updated = NotificationService::new(state.pool())
        .mark_all_read(user.id)
        .await?;
    Ok(Json(MarkedRead { updated }))
}

async fn remove(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
) -> Result<StatusCode> {
    NotificationService::new(state.pool()).delete(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
