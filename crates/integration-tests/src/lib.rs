//! Integration tests for the Boutique API.
//!
//! # Running Tests
//!
//! ```bash
//! # Start Postgres, apply migrations and run the API
//! bq-cli migrate
//! cargo run -p boutique-api
//!
//! # Run the ignored tests against it
//! cargo test -p boutique-integration-tests -- --ignored
//! ```
//!
//! `API_BASE_URL` defaults to `http://localhost:5000`. Tests that need an
//! admin account promote one directly through `DATABASE_URL`. Webhook tests
//! sign events with the server's `STRIPE_WEBHOOK_SECRET`.

#![allow(clippy::expect_used, clippy::missing_panics_doc)]

use std::time::{SystemTime, UNIX_EPOCH};

use boutique_core::{OrderStatus, UserId};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use sha2::Sha256;
use sqlx::PgPool;
use uuid::Uuid;

/// Base URL of the running API.
#[must_use]
pub fn api_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:5000".to_string())
}

/// A registered account and its access token.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: UserId,
    pub email: String,
    pub token: String,
    pub refresh_token: String,
}

/// HTTP client pointed at the API, one forwarded IP per context so the auth
/// rate limiter does not trip across tests.
pub struct TestContext {
    pub client: Client,
    pub base_url: String,
    forwarded_for: String,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let [a, b, c, ..] = *Uuid::new_v4().as_bytes();
        Self {
            client: Client::new(),
            base_url: api_base_url(),
            forwarded_for: format!("10.{a}.{b}.{c}"),
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Request with the context's forwarded IP.
    #[must_use]
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("x-forwarded-for", &self.forwarded_for)
    }

    /// Authenticated request.
    #[must_use]
    pub fn authed(&self, method: Method, path: &str, account: &Account) -> RequestBuilder {
        self.request(method, path).bearer_auth(&account.token)
    }

    /// Register a fresh account with a unique email.
    ///
    /// `extra` is merged into the registration body (role, `shop_name`, ...).
    pub async fn register(&self, extra: Value) -> Account {
        let email = format!("it-{}@example.com", Uuid::new_v4().simple());
        let mut body = json!({ "email": email, "password": "correct horse battery" });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }

        let resp = self
            .request(Method::POST, "/api/auth/register")
            .json(&body)
            .send()
            .await
            .expect("Failed to register");
        assert_eq!(resp.status(), StatusCode::CREATED, "register {email}");

        account(&email, resp.json().await.expect("Invalid register response"))
    }

    /// Log in again, e.g. after a role change.
    pub async fn login(&self, email: &str) -> Account {
        let resp = self
            .request(Method::POST, "/api/auth/login")
            .json(&json!({ "email": email, "password": "correct horse battery" }))
            .send()
            .await
            .expect("Failed to log in");
        assert_eq!(resp.status(), StatusCode::OK, "login {email}");

        account(email, resp.json().await.expect("Invalid login response"))
    }

    /// Register an account, promote it through the database and log in again
    /// so the token carries the admin role.
    pub async fn admin(&self) -> Account {
        let user = self.register(json!({})).await;
        let pool = database().await;
        sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
            .bind(user.id)
            .execute(&pool)
            .await
            .expect("Failed to promote admin");
        self.login(&user.email).await
    }

    /// Register a vendor with a shop.
    pub async fn vendor(&self) -> Account {
        self.register(json!({ "role": "vendor", "shop_name": "Atelier Test" }))
            .await
    }

    /// Vendor-owned product at 49.90 with one variant. Returns
    /// `(product_id, variant_id)`.
    pub async fn listed_product(&self, vendor: &Account, stock: u32) -> (i64, i64) {
        let resp = self
            .authed(Method::POST, "/api/products", vendor)
            .json(&json!({ "name": "Robe en lin", "price": "49.90", "category": "robes" }))
            .send()
            .await
            .expect("Failed to create product");
        assert_eq!(resp.status(), StatusCode::CREATED);
        let product: Value = resp.json().await.expect("Invalid product");
        let product_id = product["id"].as_i64().expect("product id");

        let resp = self
            .authed(
                Method::POST,
                &format!("/api/products/{product_id}/variants"),
                vendor,
            )
            .json(&json!({ "color": "Bleu", "size": "M", "stock": stock }))
            .send()
            .await
            .expect("Failed to add variant");
        assert_eq!(resp.status(), StatusCode::CREATED);
        let variant: Value = resp.json().await.expect("Invalid variant");

        (product_id, variant["id"].as_i64().expect("variant id"))
    }

    /// Stock of a product's first variant.
    pub async fn variant_stock(&self, product_id: i64) -> i64 {
        let detail: Value = self
            .request(Method::GET, &format!("/api/products/{product_id}"))
            .send()
            .await
            .expect("Failed to get product")
            .json()
            .await
            .expect("Invalid product");
        detail["variants"][0]["stock"].as_i64().expect("stock")
    }

    /// Place an order for explicit lines. Returns the order id.
    pub async fn place_order(&self, buyer: &Account, variant_id: i64, quantity: u32) -> i64 {
        let resp = self
            .authed(Method::POST, "/api/orders", buyer)
            .json(&json!({
                "items": [{ "variant_id": variant_id, "quantity": quantity }],
                "delivery_address": "1 place Bellecour",
                "payment_method": "card",
            }))
            .send()
            .await
            .expect("Failed to place order");
        assert_eq!(resp.status(), StatusCode::CREATED);
        let order: Value = resp.json().await.expect("Invalid order");
        order["id"].as_i64().expect("order id")
    }

    /// An order with its lines and payment.
    pub async fn order(&self, account: &Account, order_id: i64) -> Value {
        let resp = self
            .authed(Method::GET, &format!("/api/orders/{order_id}"), account)
            .send()
            .await
            .expect("Failed to get order");
        assert_eq!(resp.status(), StatusCode::OK);
        resp.json().await.expect("Invalid order")
    }

    /// Post a webhook event signed the way Stripe signs it.
    pub async fn webhook(&self, event: &Value) -> Response {
        let secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map(SecretString::from)
            .expect("STRIPE_WEBHOOK_SECRET not set");
        let payload = event.to_string();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Clock before epoch")
            .as_secs();

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
            .expect("Invalid webhook secret");
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        self.request(Method::POST, "/api/payments/webhook")
            .header("stripe-signature", format!("t={timestamp},v1={signature}"))
            .body(payload)
            .send()
            .await
            .expect("Failed to post webhook")
    }
}

/// Status of an order body.
#[must_use]
pub fn order_status(order: &Value) -> OrderStatus {
    order["status"]
        .as_str()
        .expect("status")
        .parse()
        .expect("known status")
}

/// Number of payment rows recorded for an order.
pub async fn payment_count(pool: &PgPool, order_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM payments WHERE order_id = $1")
        .bind(i32::try_from(order_id).expect("order id fits INTEGER"))
        .fetch_one(pool)
        .await
        .expect("Failed to count payments")
}

fn account(email: &str, session: Value) -> Account {
    Account {
        id: serde_json::from_value(session["user"]["id"].clone()).expect("user id"),
        email: email.to_string(),
        token: session["token"].as_str().expect("token").to_string(),
        refresh_token: session["refresh_token"]
            .as_str()
            .expect("refresh token")
            .to_string(),
    }
}

/// Connect to the API's database.
pub async fn database() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .expect("DATABASE_URL not set");
    PgPool::connect(url.expose_secret())
        .await
        .expect("Failed to connect to database")
}
