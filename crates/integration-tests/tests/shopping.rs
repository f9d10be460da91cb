//! Integration tests for the catalog, cart, order and payment flow.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database, reachable through `DATABASE_URL`
//! - The API server running (cargo run -p boutique-api)
//!
//! Stripe is never called: payments are confirmed through the admin route.
//! Some tests adjust rows through `DATABASE_URL` to reach states the API
//! only produces over time.
//!
//! Run with: cargo test -p boutique-integration-tests -- --ignored

use boutique_core::{OrderStatus, Price};
use boutique_integration_tests::{TestContext, database, order_status, payment_count};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};

fn price(value: &Value) -> Price {
    serde_json::from_value(value.clone()).expect("price")
}

fn cents(amount: i64) -> Price {
    Price::from_cents(amount).expect("valid amount")
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_cart_order_and_payment_flow() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let admin = ctx.admin().await;
    let (product_id, variant_id) = ctx.listed_product(&vendor, 5).await;

    // Cart
    let resp = ctx
        .authed(Method::POST, "/api/cart", &buyer)
        .json(&json!({ "variant_id": variant_id, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);
    let cart: Value = resp.json().await.expect("Invalid cart");
    assert_eq!(price(&cart["total"]), cents(9980));

    // Order from the cart
    let resp = ctx
        .authed(Method::POST, "/api/orders", &buyer)
        .json(&json!({ "delivery_address": "12 rue des Lilas, Lyon", "payment_method": "card" }))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order: Value = resp.json().await.expect("Invalid order");
    let order_id = order["id"].as_i64().expect("order id");
    assert_eq!(order_status(&order), OrderStatus::Pending);
    assert_eq!(price(&order["total_price"]), cents(9980));
    assert_eq!(price(&order["items"][0]["unit_price"]), cents(4990));

    let cart: Value = ctx
        .authed(Method::GET, "/api/cart", &buyer)
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Invalid cart");
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));

    // Stock is untouched until payment
    assert_eq!(ctx.variant_stock(product_id).await, 5);

    let resp = ctx
        .authed(
            Method::POST,
            &format!("/api/admin/orders/{order_id}/confirm-payment"),
            &admin,
        )
        .send()
        .await
        .expect("Failed to confirm payment");
    assert_eq!(resp.status(), StatusCode::OK);
    let paid: Value = resp.json().await.expect("Invalid order");
    assert_eq!(order_status(&paid), OrderStatus::Paid);
    assert_eq!(ctx.variant_stock(product_id).await, 3);

    // A paid order cannot be cancelled by the buyer
    let resp = ctx
        .authed(Method::PUT, &format!("/api/orders/{order_id}/cancel"), &buyer)
        .send()
        .await
        .expect("Failed to cancel");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Buyer was notified of creation and payment
    let inbox: Value = ctx
        .authed(Method::GET, "/api/notifications", &buyer)
        .send()
        .await
        .expect("Failed to get notifications")
        .json()
        .await
        .expect("Invalid inbox");
    assert_eq!(inbox["unread"], 2);

    // Vendor sees the sale
    let dashboard: Value = ctx
        .authed(Method::GET, "/api/vendor/dashboard", &vendor)
        .send()
        .await
        .expect("Failed to get dashboard")
        .json()
        .await
        .expect("Invalid dashboard");
    assert_eq!(price(&dashboard["revenue"]), cents(9980));
    assert_eq!(dashboard["units_sold"], 2);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_order_rejects_insufficient_stock() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let (_, variant_id) = ctx.listed_product(&vendor, 1).await;

    let resp = ctx
        .authed(Method::POST, "/api/orders", &buyer)
        .json(&json!({
            "items": [{ "variant_id": variant_id, "quantity": 3 }],
            "delivery_address": "1 place Bellecour",
            "payment_method": "card",
        }))
        .send()
        .await
        .expect("Failed to place order");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_empty_cart_cannot_be_ordered() {
    let ctx = TestContext::new();
    let buyer = ctx.register(json!({})).await;

    let resp = ctx
        .authed(Method::POST, "/api/orders", &buyer)
        .json(&json!({ "delivery_address": "1 place Bellecour", "payment_method": "card" }))
        .send()
        .await
        .expect("Failed to place order");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_pending_order_cancel_and_privacy() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let stranger = ctx.register(json!({})).await;
    let (_, variant_id) = ctx.listed_product(&vendor, 4).await;

    let order: Value = ctx
        .authed(Method::POST, "/api/orders", &buyer)
        .json(&json!({
            "items": [{ "variant_id": variant_id, "quantity": 1 }],
            "delivery_address": "1 place Bellecour",
            "payment_method": "card",
        }))
        .send()
        .await
        .expect("Failed to place order")
        .json()
        .await
        .expect("Invalid order");
    let order_id = order["id"].as_i64().expect("order id");

    let resp = ctx
        .authed(Method::GET, &format!("/api/orders/{order_id}"), &stranger)
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = ctx
        .authed(Method::PUT, &format!("/api/orders/{order_id}/cancel"), &buyer)
        .send()
        .await
        .expect("Failed to cancel");
    assert_eq!(resp.status(), StatusCode::OK);
    let cancelled: Value = resp.json().await.expect("Invalid order");
    assert_eq!(order_status(&cancelled), OrderStatus::Cancelled);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_vendor_cannot_edit_foreign_product() {
    let ctx = TestContext::new();
    let owner = ctx.vendor().await;
    let rival = ctx.vendor().await;
    let (product_id, _) = ctx.listed_product(&owner, 1).await;

    let resp = ctx
        .authed(Method::PUT, &format!("/api/products/{product_id}"), &rival)
        .json(&json!({ "price": "1.00" }))
        .send()
        .await
        .expect("Failed to update product");

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_favorites_are_idempotent() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let (product_id, _) = ctx.listed_product(&vendor, 1).await;

    for _ in 0..2 {
        let resp = ctx
            .authed(Method::POST, "/api/favorites", &buyer)
            .json(&json!({ "product_id": product_id }))
            .send()
            .await
            .expect("Failed to add favorite");
        assert!(resp.status().is_success());
    }

    let favorites: Value = ctx
        .authed(Method::GET, "/api/favorites", &buyer)
        .send()
        .await
        .expect("Failed to list favorites")
        .json()
        .await
        .expect("Invalid favorites");
    assert_eq!(favorites.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_webhook_rejects_forged_signature() {
    let ctx = TestContext::new();

    let resp = ctx
        .request(Method::POST, "/api/payments/webhook")
        .header("stripe-signature", "t=1700000000,v1=00")
        .body(r#"{"id":"evt_forged","type":"checkout.session.completed"}"#)
        .send()
        .await
        .expect("Failed to post webhook");

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_cart_update_remove_and_clear() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let (_, variant_id) = ctx.listed_product(&vendor, 5).await;

    let cart: Value = ctx
        .authed(Method::POST, "/api/cart", &buyer)
        .json(&json!({ "variant_id": variant_id, "quantity": 1 }))
        .send()
        .await
        .expect("Failed to add to cart")
        .json()
        .await
        .expect("Invalid cart");
    let item_id = cart["items"][0]["id"].as_i64().expect("item id");

    let resp = ctx
        .authed(Method::PUT, &format!("/api/cart/{item_id}"), &buyer)
        .json(&json!({ "quantity": 3 }))
        .send()
        .await
        .expect("Failed to update cart");
    assert_eq!(resp.status(), StatusCode::OK);
    let cart: Value = resp.json().await.expect("Invalid cart");
    assert_eq!(cart["items"][0]["quantity"], 3);
    assert_eq!(price(&cart["total"]), cents(14970));

    // More than in stock
    let resp = ctx
        .authed(Method::PUT, &format!("/api/cart/{item_id}"), &buyer)
        .json(&json!({ "quantity": 6 }))
        .send()
        .await
        .expect("Failed to update cart");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx
        .authed(Method::DELETE, &format!("/api/cart/{item_id}"), &buyer)
        .send()
        .await
        .expect("Failed to remove item");
    assert_eq!(resp.status(), StatusCode::OK);
    let cart: Value = resp.json().await.expect("Invalid cart");
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(price(&cart["total"]), Price::ZERO);

    let resp = ctx
        .authed(Method::POST, "/api/cart", &buyer)
        .json(&json!({ "variant_id": variant_id, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add to cart");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .authed(Method::DELETE, "/api/cart", &buyer)
        .send()
        .await
        .expect("Failed to clear cart");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let cart: Value = ctx
        .authed(Method::GET, "/api/cart", &buyer)
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Invalid cart");
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_second_confirmation_changes_nothing() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let admin = ctx.admin().await;
    let (product_id, variant_id) = ctx.listed_product(&vendor, 5).await;
    let order_id = ctx.place_order(&buyer, variant_id, 2).await;
    let confirm = format!("/api/admin/orders/{order_id}/confirm-payment");

    let resp = ctx
        .authed(Method::POST, &confirm, &admin)
        .send()
        .await
        .expect("Failed to confirm payment");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ctx
        .authed(Method::POST, &confirm, &admin)
        .send()
        .await
        .expect("Failed to confirm payment");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(ctx.variant_stock(product_id).await, 3);
    assert_eq!(payment_count(&database().await, order_id).await, 1);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_oversold_confirmation_writes_nothing() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let admin = ctx.admin().await;
    let (product_id, variant_id) = ctx.listed_product(&vendor, 2).await;
    let order_id = ctx.place_order(&buyer, variant_id, 2).await;

    // Another sale took the stock after the order was placed
    let pool = database().await;
    sqlx::query("UPDATE product_variants SET stock = 1 WHERE id = $1")
        .bind(i32::try_from(variant_id).expect("variant id fits INTEGER"))
        .execute(&pool)
        .await
        .expect("Failed to lower stock");

    let resp = ctx
        .authed(
            Method::POST,
            &format!("/api/admin/orders/{order_id}/confirm-payment"),
            &admin,
        )
        .send()
        .await
        .expect("Failed to confirm payment");
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let order = ctx.order(&buyer, order_id).await;
    assert_eq!(order_status(&order), OrderStatus::Pending);
    assert!(order["payment"].is_null());
    assert_eq!(ctx.variant_stock(product_id).await, 1);
    assert_eq!(payment_count(&pool, order_id).await, 0);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_refunded_payment_is_final() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let admin = ctx.admin().await;
    let (_, variant_id) = ctx.listed_product(&vendor, 2).await;
    let order_id = ctx.place_order(&buyer, variant_id, 1).await;

    let resp = ctx
        .authed(
            Method::POST,
            &format!("/api/admin/orders/{order_id}/confirm-payment"),
            &admin,
        )
        .send()
        .await
        .expect("Failed to confirm payment");
    assert_eq!(resp.status(), StatusCode::OK);

    let order = ctx.order(&buyer, order_id).await;
    let payment_id = order["payment"]["id"].as_i64().expect("payment id");

    let pool = database().await;
    sqlx::query(
        "UPDATE payments SET status = 'Remboursé', payment_intent_id = 'pi_test_refunded' WHERE id = $1",
    )
        .bind(i32::try_from(payment_id).expect("payment id fits INTEGER"))
        .execute(&pool)
        .await
        .expect("Failed to mark refunded");

    let resp = ctx
        .authed(
            Method::POST,
            &format!("/api/admin/payments/{payment_id}/refund"),
            &admin,
        )
        .send()
        .await
        .expect("Failed to refund");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx
        .authed(
            Method::PUT,
            &format!("/api/admin/payments/{payment_id}/status"),
            &admin,
        )
        .json(&json!({ "status": "Payé" }))
        .send()
        .await
        .expect("Failed to set payment status");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let order = ctx.order(&buyer, order_id).await;
    assert_eq!(order["payment"]["status"], "Remboursé");
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_variant_price_override_can_be_cleared() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let (_, variant_id) = ctx.listed_product(&vendor, 2).await;
    let path = format!("/api/variants/{variant_id}");

    let resp = ctx
        .authed(Method::PUT, &path, &vendor)
        .json(&json!({ "price": "39.90" }))
        .send()
        .await
        .expect("Failed to update variant");
    assert_eq!(resp.status(), StatusCode::OK);
    let variant: Value = resp.json().await.expect("Invalid variant");
    assert_eq!(price(&variant["price"]), cents(3990));

    let resp = ctx
        .authed(Method::PUT, &path, &vendor)
        .json(&json!({ "clear_price": true, "stock": 7 }))
        .send()
        .await
        .expect("Failed to update variant");
    assert_eq!(resp.status(), StatusCode::OK);
    let variant: Value = resp.json().await.expect("Invalid variant");
    assert!(variant["price"].is_null());
    assert_eq!(variant["stock"], 7);
}

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_out_of_range_catalog_values_are_bad_requests() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let (product_id, variant_id) = ctx.listed_product(&vendor, 2).await;

    let resp = ctx
        .authed(
            Method::POST,
            &format!("/api/products/{product_id}/variants"),
            &vendor,
        )
        .json(&json!({ "size": "XL", "stock": 3_000_000_000_u32 }))
        .send()
        .await
        .expect("Failed to add variant");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx
        .authed(Method::PUT, &format!("/api/variants/{variant_id}"), &vendor)
        .json(&json!({ "price": "100000000" }))
        .send()
        .await
        .expect("Failed to update variant");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = ctx
        .authed(Method::PUT, &format!("/api/products/{product_id}"), &vendor)
        .json(&json!({ "price": "100000000" }))
        .send()
        .await
        .expect("Failed to update product");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
