//! Payment endpoints and the Stripe webhook.
//!
//! The webhook reads the raw body: the signature covers the exact bytes Stripe
//! sent, so it must be verified before any JSON parsing.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use boutique_core::OrderId;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{PageParams, Paginated, Payment};
use crate::routes::extract::{Json, Query};
use crate::services::payments::{CheckoutRedirect, PaymentService, WebhookOutcome};
use crate::state::AppState;

/// Header carrying the webhook signature.
const STRIPE_SIGNATURE: &str = "stripe-signature";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(checkout))
        .route("/webhook", post(webhook))
}

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub order_id: OrderId,
}

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: WebhookOutcome,
}

fn service(state: &AppState) -> PaymentService<'_> {
    PaymentService::new(state.pool(), state.stripe(), &state.config().frontend_url)
}

async fn list(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Paginated<Payment>>> {
    Ok(Json(service(&state).list_own(user.id, params).await?))
}

async fn checkout(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(body): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutRedirect>)> {
    let redirect = service(&state).checkout(&user, body.order_id).await?;
    Ok((StatusCode::CREATED, Json(redirect)))
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: String,
) -> Result<Json<WebhookAck>> {
    let signature = headers
        .get(STRIPE_SIGNATURE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("Missing Stripe-Signature header".to_string()))?;

    let outcome = service(&state).handle_webhook(&payload, signature).await?;

    Ok(Json(WebhookAck {
        received: true,
        outcome,
    }))
}
