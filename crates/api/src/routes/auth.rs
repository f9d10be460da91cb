//! Authentication endpoints.
//!
//! Register, login and refresh are rate limited per client IP.

use axum::{Router, extract::State, http::StatusCode, routing::post};
use serde::Deserialize;

use crate::error::Result;
use crate::middleware::auth_rate_limiter;
use crate::routes::extract::Json;
use crate::services::auth::{AuthService, AuthSession, Registration};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .layer(auth_rate_limiter())
        .route("/logout", post(logout))
}

/// Login form.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Refresh or logout body.
#[derive(Debug, Deserialize)]
pub struct RefreshForm {
    pub refresh_token: String,
}

async fn register(
    State(state): State<AppState>,
    Json(form): Json<Registration>,
) -> Result<(StatusCode, Json<AuthSession>)> {
    let session = AuthService::new(state.pool(), state.tokens())
        .register(&form)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> Result<Json<AuthSession>> {
    let session = AuthService::new(state.pool(), state.tokens())
        .login(&form.email, &form.password)
        .await?;
    Ok(Json(session))
}

async fn refresh(
    State(state): State<AppState>,
    Json(form): Json<RefreshForm>,
) -> Result<Json<AuthSession>> {
    let session = AuthService::new(state.pool(), state.tokens())
        .refresh(&form.refresh_token)
        .await?;
    Ok(Json(session))
}

async fn logout(
    State(state): State<AppState>,
    Json(form): Json<RefreshForm>,
) -> Result<StatusCode> {
    AuthService::new(state.pool(), state.tokens())
        .logout(&form.refresh_token)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
