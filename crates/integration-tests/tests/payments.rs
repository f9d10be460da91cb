//! Integration tests for Stripe webhook handling.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database, reachable through `DATABASE_URL`
//! - The API server running with the same `STRIPE_WEBHOOK_SECRET`
//!
//! Events are signed locally. Only refunds reach Stripe, so the test for a
//! charge on a cancelled order checks what was recorded, not the refund.
//!
//! Run with: cargo test -p boutique-integration-tests -- --ignored

use boutique_core::OrderStatus;
use boutique_integration_tests::{TestContext, database, order_status, payment_count};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

fn event_id() -> String {
    format!("evt_test_{}", Uuid::new_v4().simple())
}

fn session_event(id: &str, event_type: &str, order_id: i64, payment_intent: &str) -> Value {
    json!({
        "id": id,
        "type": event_type,
        "data": { "object": {
            "id": format!("cs_test_{}", Uuid::new_v4().simple()),
            "url": null,
            "payment_intent": payment_intent,
            "metadata": { "orderId": order_id.to_string() },
        }},
    })
}

fn completed(order_id: i64, payment_intent: &str) -> Value {
    session_event(&event_id(), "checkout.session.completed", order_id, payment_intent)
}

async fn outcome(resp: reqwest::Response) -> String {
    assert_eq!(resp.status(), StatusCode::OK);
    let ack: Value = resp.json().await.expect("Invalid acknowledgement");
    ack["outcome"].as_str().expect("outcome").to_string()
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_declined_card_leaves_order_payable() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let (product_id, variant_id) = ctx.listed_product(&vendor, 3).await;
    let order_id = ctx.place_order(&buyer, variant_id, 1).await;

    let declined = json!({
        "id": event_id(),
        "type": "payment_intent.payment_failed",
        "data": { "object": {
            "id": "pi_test_declined",
            "metadata": { "orderId": order_id.to_string() },
        }},
    });
    assert_eq!(outcome(ctx.webhook(&declined).await).await, "processed");
    assert_eq!(
        order_status(&ctx.order(&buyer, order_id).await),
        OrderStatus::Pending
    );

    // The customer retries in the same session and the card goes through
    assert_eq!(
        outcome(ctx.webhook(&completed(order_id, "pi_test_retry")).await).await,
        "processed"
    );

    let order = ctx.order(&buyer, order_id).await;
    assert_eq!(order_status(&order), OrderStatus::Paid);
    assert_eq!(order["payment"]["payment_intent_id"], "pi_test_retry");
    assert_eq!(ctx.variant_stock(product_id).await, 2);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_late_charge_settles_expired_order() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let (product_id, variant_id) = ctx.listed_product(&vendor, 3).await;
    let order_id = ctx.place_order(&buyer, variant_id, 2).await;

    let expired = session_event(
        &event_id(),
        "checkout.session.expired",
        order_id,
        "pi_test_late",
    );
    assert_eq!(outcome(ctx.webhook(&expired).await).await, "processed");
    assert_eq!(
        order_status(&ctx.order(&buyer, order_id).await),
        OrderStatus::PaymentFailed
    );

    assert_eq!(
        outcome(ctx.webhook(&completed(order_id, "pi_test_late")).await).await,
        "processed"
    );

    let order = ctx.order(&buyer, order_id).await;
    assert_eq!(order_status(&order), OrderStatus::Paid);
    assert_eq!(order["payment"]["status"], "Payé");
    assert_eq!(ctx.variant_stock(product_id).await, 1);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_replayed_event_is_applied_once() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let (product_id, variant_id) = ctx.listed_product(&vendor, 4).await;
    let order_id = ctx.place_order(&buyer, variant_id, 2).await;

    let event = completed(order_id, "pi_test_replay");
    assert_eq!(outcome(ctx.webhook(&event).await).await, "processed");
    assert_eq!(outcome(ctx.webhook(&event).await).await, "duplicate");

    assert_eq!(ctx.variant_stock(product_id).await, 2);
    assert_eq!(payment_count(&database().await, order_id).await, 1);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_webhook_after_manual_confirmation_attaches_intent() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let admin = ctx.admin().await;
    let (product_id, variant_id) = ctx.listed_product(&vendor, 4).await;
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

    assert_eq!(
        outcome(ctx.webhook(&completed(order_id, "pi_test_manual")).await).await,
        "processed"
    );

    let order = ctx.order(&buyer, order_id).await;
    assert_eq!(order_status(&order), OrderStatus::Paid);
    assert_eq!(order["payment"]["payment_intent_id"], "pi_test_manual");
    assert_eq!(order["payment"]["status"], "Payé");
    assert_eq!(ctx.variant_stock(product_id).await, 3);
    assert_eq!(payment_count(&database().await, order_id).await, 1);
}

#[tokio::test]
#[ignore = "Requires running API server and database"]
async fn test_charge_for_cancelled_order_is_recorded() {
    let ctx = TestContext::new();
    let vendor = ctx.vendor().await;
    let buyer = ctx.register(json!({})).await;
    let (product_id, variant_id) = ctx.listed_product(&vendor, 2).await;
    let order_id = ctx.place_order(&buyer, variant_id, 1).await;

    let resp = ctx
        .authed(
            Method::PUT,
            &format!("/api/orders/{order_id}/cancel"),
            &buyer,
        )
        .send()
        .await
        .expect("Failed to cancel");
    assert_eq!(resp.status(), StatusCode::OK);

    // The refund itself goes to Stripe; its result depends on the key in use
    ctx.webhook(&completed(order_id, "pi_test_stray")).await;

    let order = ctx.order(&buyer, order_id).await;
    assert_eq!(order_status(&order), OrderStatus::Cancelled);
    assert_eq!(order["payment"]["payment_intent_id"], "pi_test_stray");
    assert_eq!(ctx.variant_stock(product_id).await, 2);
    assert_eq!(payment_count(&database().await, order_id).await, 1);
}
