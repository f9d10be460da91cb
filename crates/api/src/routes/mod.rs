//! HTTP route handlers for the REST API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness
//! GET  /health/ready                   - Readiness (database ping)
//!
//! # Auth (rate limited except logout)
//! POST /api/auth/register | login | refresh | logout
//!
//! # Account
//! GET|PUT|DELETE /api/users/me
//! PUT  /api/users/me/password
//!
//! # Catalog
//! GET|POST        /api/products
//! GET|PUT|DELETE  /api/products/{id}
//! POST            /api/products/{id}/variants
//! PUT|DELETE      /api/variants/{id}
//!
//! # Shopping
//! GET|POST|DELETE /api/cart,  PUT|DELETE /api/cart/{item_id}
//! GET|POST        /api/favorites,  DELETE /api/favorites/{product_id}
//! GET|POST        /api/orders,  GET /api/orders/{id},  PUT /api/orders/{id}/cancel
//! GET|POST        /api/payments,  POST /api/payments/webhook
//! GET /api/notifications,  PUT /api/notifications/{id}/read | read-all,
//! DELETE /api/notifications/{id}
//!
//! # Vendor
//! GET /api/vendor/dashboard | sales | orders
//!
//! # Admin
//! /api/admin/dashboard/*, users, products, orders, payments
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod extract;
pub mod favorites;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod users;
pub mod vendor;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware::from_fn,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::config::ApiConfig;
use crate::middleware::{REQUEST_ID_HEADER, request_id_middleware};
use crate::state::AppState;

/// All `/api` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .merge(products::router())
        .nest("/cart", cart::router())
        .nest("/favorites", favorites::router())
        .nest("/orders", orders::router())
        .nest("/payments", payments::router())
        .nest("/notifications", notifications::router())
        .nest("/vendor", vendor::router())
        .nest("/admin", admin::router())
}

/// Build the complete application with middleware.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config());

    Router::new()
        .merge(health::router())
        .nest("/api", api_routes())
        .layer(from_fn(request_id_middleware))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// CORS for the dashboard origin. An unparsable origin allows none.
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origin = config.cors_allowed_origin.parse::<HeaderValue>().ok();
    if origin.is_none() {
        tracing::warn!(
            origin = %config.cors_allowed_origin,
            "Invalid CORS_ALLOWED_ORIGIN, cross-origin requests will be rejected"
        );
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origin))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use boutique_core::{Role, UserId};

    use super::*;
    use crate::config::tests::sample_config;

    fn test_state() -> AppState {
        let config = sample_config();
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/boutique_test")
            .unwrap();
        AppState::new(config, pool)
    }

    fn bearer(state: &AppState, role: Role) -> String {
        let token = state.tokens().issue_access(UserId::new(42), role).unwrap();
        format!("Bearer {token}")
    }

    async fn message(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        value["message"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(test_state())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let response = app(test_state())
            .oneshot(Request::get("/api/cart").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(message(response).await, "Missing bearer token");
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let response = app(test_state())
            .oneshot(
                Request::get("/api/orders")
                    .header("authorization", "Bearer not.a.jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_customer_cannot_reach_admin_or_vendor_routes() {
        let state = test_state();
        let auth = bearer(&state, Role::User);
        let app = app(state);

        for uri in ["/api/admin/dashboard/stats", "/api/vendor/dashboard"] {
            let response = app
                .clone()
                .oneshot(
                    Request::get(uri)
                        .header("authorization", &auth)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_vendor_cannot_reach_admin_routes() {
        let state = test_state();
        let auth = bearer(&state, Role::Vendor);

        let response = app(state)
            .oneshot(
                Request::get("/api/admin/users")
                    .header("authorization", auth)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_webhook_requires_signature() {
        let response = app(test_state())
            .oneshot(
                Request::post("/api/payments/webhook")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(message(response).await, "Missing Stripe-Signature header");
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature() {
        let response = app(test_state())
            .oneshot(
                Request::post("/api/payments/webhook")
                    .header("stripe-signature", "t=1,v1=deadbeef")
                    .body(Body::from(r#"{"id": "evt_1"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(message(response).await, "Invalid webhook");
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_bad_request() {
        let state = test_state();
        let auth = bearer(&state, Role::User);

        let response = app(state)
            .oneshot(
                Request::post("/api/cart")
                    .header("authorization", auth)
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"variant_id": "abc"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_validates_before_touching_database() {
        let response = app(test_state())
            .oneshot(
                Request::post("/api/auth/register")
                    .header("content-type", "application/json")
                    .header("x-forwarded-for", "203.0.113.7")
                    .body(Body::from(
                        r#"{"email": "not-an-email", "password": "longenough"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(message(response).await, "Invalid email address");
    }
}
