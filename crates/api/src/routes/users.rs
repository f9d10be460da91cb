//! The caller's own account.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use serde::Deserialize;

use crate::db::users::ProfileUpdate;
use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::models::User;
use crate::routes::extract::Json;
use crate::services::auth::AuthService;
use crate::services::users::{Profile, UserService};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me).put(update).delete(delete))
        .route("/me/password", put(change_password))
}

/// Password change form.
#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

async fn me(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Profile>> {
    Ok(Json(UserService::new(state.pool()).me(user.id).await?))
}

async fn update(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<User>> {
    Ok(Json(
        UserService::new(state.pool()).update(user.id, &update).await?,
    ))
}

async fn change_password(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(form): Json<PasswordChange>,
) -> Result<StatusCode> {
    AuthService::new(state.pool(), state.tokens())
        .change_password(user.id, &form.current_password, &form.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete(RequireAuth(user): RequireAuth, State(state): State<AppState>) -> Result<StatusCode> {
    UserService::new(state.pool()).delete(user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
