//! Stripe Checkout payments.
//!
//! # Flow
//!
//! 1. The customer places an order (`En attente`) and asks for a Checkout
//!    Session. Its metadata carries `orderId` and `userId`.
//! 2. Stripe calls the webhook with `checkout.session.completed`.
//! 3. [`confirm_order`] runs in a single transaction: it records the event,
//!    moves the order to `Payé`, decrements stock with a guarded update,
//!    inserts the payment and notifies the customer.
//!
//! Stripe delivers events at least once. A redelivered event is recorded
//! already and is acknowledged without side effects. Admins can trigger the
//! same confirmation manually.
//!
//! A declined card leaves the order pending so the customer can retry in the
//! same session. Only an expired session fails the order, and a charge that
//! still lands afterwards settles it. A charge for an order that can no
//! longer be paid is recorded and refunded.

use sqlx::{PgConnection, PgPool};
use tracing::{error, info, instrument, warn};
use url::Url;

use boutique_core::{OrderId, OrderStatus, PaymentId, PaymentStatus, UserId};

use crate::db::payments::NewPayment;
use crate::db::{
    NotificationRepository, OrderRepository, PaymentRepository, ProductRepository,
    StripeEventRepository,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{CurrentUser, Order, OrderLine, PageParams, Paginated, Payment};
use crate::services::notifications::messages;
use crate::stripe::types::PaymentIntent;
use crate::stripe::{CheckoutLine, CheckoutSession, Event, StripeClient};

/// Event types that confirm a payment.
const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
/// Event type that fails a pending order.
const CHECKOUT_EXPIRED: &str = "checkout.session.expired";
/// A declined attempt; the session stays open.
const PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// What triggered a payment confirmation.
#[derive(Debug, Clone, Copy)]
pub struct Confirmation<'a> {
    pub order_id: OrderId,
    /// Webhook event `(id, type)`, absent for manual confirmations.
    pub event: Option<(&'a str, &'a str)>,
    pub payment_intent_id: Option<&'a str>,
    pub checkout_session_id: Option<&'a str>,
}

/// Result of [`confirm_order`].
#[derive(Debug)]
pub enum Confirmed {
    /// The order moved to `Payé`.
    Paid { order: Order, payment: Payment },
    /// The event was processed before.
    Duplicate,
    /// The order can no longer be paid. `stray` is set when Stripe charged
    /// for it anyway.
    NotPayable {
        status: OrderStatus,
        stray: Option<StrayCharge>,
    },
}

/// A charge that must be given back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrayCharge {
    /// Recorded as this payment.
    Recorded(PaymentId),
    /// The order is paid by another intent; this one has no payment row.
    Unrecorded(String),
}

/// Outcome of a webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOutcome {
    Processed,
    Duplicate,
    Ignored,
}

/// A Checkout Session ready for redirect.
#[derive(Debug, serde::Serialize)]
pub struct CheckoutRedirect {
    pub session_id: String,
    pub url: Option<String>,
}

/// Confirm payment of a pending order in one transaction.
///
/// Orders whose session expired are settled too. For any other status the
/// charge is reconciled with the existing payment; see [`StrayCharge`].
///
/// # Errors
///
/// Returns `AppError::NotFound` if the order doesn't exist.
/// Returns `AppError::Conflict` if a variant no longer has enough stock, in
/// which case nothing is written.
#[instrument(skip(pool, confirmation), fields(order_id = %confirmation.order_id))]
pub async fn confirm_order(pool: &PgPool, confirmation: Confirmation<'_>) -> Result<Confirmed> {
    let order_id = confirmation.order_id;
    let mut tx = pool.begin().await?;

    if let Some((event_id, event_type)) = confirmation.event
        && !StripeEventRepository::record_in(&mut *tx, event_id, event_type).await?
    {
        info!(event_id, "Duplicate webhook event");
        return Ok(Confirmed::Duplicate);
    }

    let mut paid =
        OrderRepository::transition_in(&mut *tx, order_id, OrderStatus::Pending, OrderStatus::Paid)
            .await?;
    if paid.is_none() {
        paid = OrderRepository::transition_in(
            &mut *tx,
            order_id,
            OrderStatus::PaymentFailed,
            OrderStatus::Paid,
        )
        .await?;
    }

    let Some(order) = paid else {
        let order = OrderRepository::lock_in(&mut *tx, order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        let stray = match confirmation.payment_intent_id {
            Some(intent) => {
                reconcile_charge_in(&mut *tx, &order, intent, confirmation.checkout_session_id)
                    .await?
            }
            None => None,
        };
        // Keep the event so redelivery is a no-op.
        tx.commit().await?;
        warn!(
            status = %order.status,
            stray = stray.is_some(),
            "Payment confirmation for an order that cannot be paid"
        );
        return Ok(Confirmed::NotPayable {
            status: order.status,
            stray,
        });
    };

    let lines = OrderRepository::lines_in(&mut *tx, order_id).await?;
    for line in &lines {
        if !ProductRepository::decrement_stock_in(&mut *tx, line.variant_id, line.quantity).await? {
            return Err(AppError::Conflict(format!(
                "insufficient stock for variant {}",
                line.variant_id
            )));
        }
    }

    let payment = PaymentRepository::create_paid_in(
        &mut *tx,
        &NewPayment {
            order_id,
            user_id: order.user_id,
            amount: order.total_price,
            payment_intent_id: confirmation.payment_intent_id,
            checkout_session_id: confirmation.checkout_session_id,
        },
    )
    .await?;

    NotificationRepository::create_in(&mut *tx, order.user_id, &messages::payment_confirmed(order_id))
        .await?;

    tx.commit().await?;

    info!(payment_id = %payment.id, amount = %order.total_price, "Order paid");
    let order_ref = order_id.to_string();
    add_breadcrumb("payment", "Order paid", Some(&[("order_id", order_ref.as_str())]));

    Ok(Confirmed::Paid { order, payment })
}

/// Match a charge against an order that is already settled or cancelled.
async fn reconcile_charge_in(
    conn: &mut PgConnection,
    order: &Order,
    payment_intent_id: &str,
    checkout_session_id: Option<&str>,
) -> Result<Option<StrayCharge>> {
    match PaymentRepository::lock_by_order_in(conn, order.id).await? {
        Some(payment) => match payment.payment_intent_id.as_deref() {
            // Confirmed by an admin before the webhook arrived.
            None => {
                PaymentRepository::attach_stripe_in(
                    conn,
                    payment.id,
                    payment_intent_id,
                    checkout_session_id,
                )
                .await?;
                Ok(None)
            }
            Some(existing) if existing == payment_intent_id => Ok(None),
            Some(_) => Ok(Some(StrayCharge::Unrecorded(payment_intent_id.to_owned()))),
        },
        None => {
            let payment = PaymentRepository::create_paid_in(
                conn,
                &NewPayment {
                    order_id: order.id,
                    user_id: order.user_id,
                    amount: order.total_price,
                    payment_intent_id: Some(payment_intent_id),
                    checkout_session_id,
                },
            )
            .await?;
            Ok(Some(StrayCharge::Recorded(payment.id)))
        }
    }
}

/// Record a declined card attempt. The order stays pending.
///
/// # Errors
///
/// Returns `AppError::Database` if the event can't be recorded.
#[instrument(skip(pool))]
pub async fn record_declined_attempt(
    pool: &PgPool,
    order_id: OrderId,
    event_id: &str,
    event_type: &str,
) -> Result<WebhookOutcome> {
    let mut tx = pool.begin().await?;

    if !StripeEventRepository::record_in(&mut *tx, event_id, event_type).await? {
        return Ok(WebhookOutcome::Duplicate);
    }

    if let Some(order) = OrderRepository::lock_in(&mut *tx, order_id).await?
        && order.status == OrderStatus::Pending
    {
        NotificationRepository::create_in(
            &mut *tx,
            order.user_id,
            &messages::payment_declined(order_id),
        )
        .await?;
    }

    tx.commit().await?;

    info!("Payment attempt declined");

    Ok(WebhookOutcome::Processed)
}

/// Move a pending order to `Échec du paiement`.
async fn fail_order(pool: &PgPool, order_id: OrderId, event: &Event) -> Result<WebhookOutcome> {
    let mut tx = pool.begin().await?;

    if !StripeEventRepository::record_in(&mut *tx, &event.id, &event.event_type).await? {
        return Ok(WebhookOutcome::Duplicate);
    }

    if let Some(order) = OrderRepository::transition_in(
        &mut *tx,
        order_id,
        OrderStatus::Pending,
        OrderStatus::PaymentFailed,
    )
    .await?
    {
        NotificationRepository::create_in(&mut *tx, order.user_id, &messages::payment_failed(order_id))
            .await?;
        info!(order_id = %order_id, "Order payment failed");
    }

    tx.commit().await?;

    Ok(WebhookOutcome::Processed)
}

/// Payment service.
pub struct PaymentService<'a> {
    pool: &'a PgPool,
    stripe: &'a StripeClient,
    frontend_url: &'a Url,
    payments: PaymentRepository<'a>,
    orders: OrderRepository<'a>,
}

impl<'a> PaymentService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, stripe: &'a StripeClient, frontend_url: &'a Url) -> Self {
        Self {
            pool,
            stripe,
            frontend_url,
            payments: PaymentRepository::new(pool),
            orders: OrderRepository::new(pool),
        }
    }

    /// Create a Checkout Session for one of the caller's pending orders.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` if the caller doesn't own the order,
    /// `AppError::BadRequest` if it isn't pending and `AppError::Stripe` if
    /// Stripe rejects the session.
    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn checkout(&self, user: &CurrentUser, order_id: OrderId) -> Result<CheckoutRedirect> {
        let order = self
            .orders
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if order.user_id != user.id {
            return Err(AppError::Forbidden("You can only pay for your own orders".to_string()));
        }
        if order.status != OrderStatus::Pending {
            return Err(AppError::BadRequest(format!(
                "order {order_id} is {} and cannot be paid",
                order.status
            )));
        }

        let lines = checkout_lines(&self.orders.lines(order_id).await?)?;
        let success_url = self.redirect_url(&format!("orders/{order_id}?payment=success"))?;
        let cancel_url = self.redirect_url(&format!("orders/{order_id}?payment=cancelled"))?;

        let session: CheckoutSession = self
            .stripe
            .create_checkout_session(
                order_id.as_i32(),
                order.user_id.as_i32(),
                &lines,
                &success_url,
                &cancel_url,
            )
            .await?;

        info!(session_id = %session.id, "Checkout session created");

        Ok(CheckoutRedirect {
            session_id: session.id,
            url: session.url,
        })
    }

    /// Verify and apply a webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Stripe` if the signature or payload is invalid and
    /// `AppError::Conflict` if a paid order can no longer be fulfilled.
    #[instrument(skip_all, fields(event_id = tracing::field::Empty))]
    pub async fn handle_webhook(&self, payload: &str, signature: &str) -> Result<WebhookOutcome> {
        let event = self.stripe.construct_event(payload, signature)?;
        tracing::Span::current().record("event_id", event.id.as_str());

        match event.event_type.as_str() {
            CHECKOUT_COMPLETED => {
                let session: CheckoutSession = event.object().map_err(invalid_object)?;
                let order_id = session_order(session.order_id())?;

                let confirmed = confirm_order(
                    self.pool,
                    Confirmation {
                        order_id,
                        event: Some((event.id.as_str(), event.event_type.as_str())),
                        payment_intent_id: session.payment_intent.as_deref(),
                        checkout_session_id: Some(session.id.as_str()),
                    },
                )
                .await
                .inspect_err(|e| {
                    if matches!(e, AppError::Conflict(_)) {
                        error!(order_id = %order_id, error = %e, "Paid order could not be fulfilled");
                    }
                })?;

                match confirmed {
                    Confirmed::Duplicate => Ok(WebhookOutcome::Duplicate),
                    Confirmed::Paid { .. } | Confirmed::NotPayable { stray: None, .. } => {
                        Ok(WebhookOutcome::Processed)
                    }
                    Confirmed::NotPayable {
                        status,
                        stray: Some(stray),
                    } => {
                        error!(
                            order_id = %order_id,
                            status = %status,
                            "Charge received for an order that cannot be paid, refunding"
                        );
                        self.return_charge(stray).await?;
                        Ok(WebhookOutcome::Processed)
                    }
                }
            }
            CHECKOUT_EXPIRED => {
                let session: CheckoutSession = event.object().map_err(invalid_object)?;
                fail_order(self.pool, session_order(session.order_id())?, &event).await
            }
            PAYMENT_FAILED => {
                let intent: PaymentIntent = event.object().map_err(invalid_object)?;
                let order_id = session_order(intent.order_id())?;
                record_declined_attempt(self.pool, order_id, &event.id, &event.event_type).await
            }
            other => {
                info!(event_type = other, "Ignoring webhook event");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Refund a settled payment through Stripe.
    ///
    /// Stock is not restored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transition` if the payment isn't `Payé`,
    /// `AppError::BadRequest` if it has no payment intent and `AppError::Stripe`
    /// if the refund fails.
    #[instrument(skip(self))]
    pub async fn refund(&self, payment_id: PaymentId) -> Result<Payment> {
        let payment = self.get(payment_id).await?;
        payment.status.transition_to(PaymentStatus::Refunded)?;

        let payment_intent = payment.payment_intent_id.as_deref().ok_or_else(|| {
            AppError::BadRequest(format!("payment {payment_id} has no payment intent to refund"))
        })?;

        let refund = self.stripe.create_refund(payment_intent).await?;

        let mut tx = self.pool.begin().await?;
        let refunded = PaymentRepository::transition_in(
            &mut *tx,
            payment_id,
            PaymentStatus::Paid,
            PaymentStatus::Refunded,
        )
        .await?
        .ok_or_else(|| AppError::Conflict(format!("payment {payment_id} changed during refund")))?;
        NotificationRepository::create_in(
            &mut *tx,
            refunded.user_id,
            &messages::payment_refunded(refunded.order_id),
        )
        .await?;
        tx.commit().await?;

        info!(refund_id = %refund.id, order_id = %refunded.order_id, "Payment refunded");

        Ok(refunded)
    }

    /// Refund a charge that arrived for an order that can't take it.
    async fn return_charge(&self, stray: StrayCharge) -> Result<()> {
        match stray {
            StrayCharge::Recorded(payment_id) => {
                self.refund(payment_id).await.inspect_err(|e| {
                    error!(payment_id = %payment_id, error = %e, "Automatic refund failed");
                })?;
            }
            StrayCharge::Unrecorded(payment_intent) => {
                let refund = self
                    .stripe
                    .create_refund(&payment_intent)
                    .await
                    .inspect_err(|e| {
                        error!(payment_intent = %payment_intent, error = %e, "Automatic refund failed");
                    })?;
                info!(refund_id = %refund.id, payment_intent = %payment_intent, "Duplicate charge refunded");
            }
        }
        Ok(())
    }

    /// Change a payment's status. `Remboursé` goes through [`Self::refund`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transition` if the change is not allowed.
    #[instrument(skip(self))]
    pub async fn set_status(&self, payment_id: PaymentId, status: PaymentStatus) -> Result<Payment> {
        if status == PaymentStatus::Refunded {
            return self.refund(payment_id).await;
        }

        let payment = self.get(payment_id).await?;
        payment.status.transition_to(status)?;

        let mut tx = self.pool.begin().await?;
        let updated = PaymentRepository::transition_in(&mut *tx, payment_id, payment.status, status)
            .await?
            .ok_or_else(|| AppError::Conflict(format!("payment {payment_id} changed concurrently")))?;
        tx.commit().await?;

        info!(status = %status, "Payment status changed");

        Ok(updated)
    }

    /// The caller's payments, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_own(&self, user_id: UserId, params: PageParams) -> Result<Paginated<Payment>> {
        let (items, total) = self
            .payments
            .list_for_user(user_id, params.limit(), params.offset())
            .await?;
        Ok(Paginated::new(items, params, total))
    }

    async fn get(&self, id: PaymentId) -> Result<Payment> {
        self.payments
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("payment {id} not found")))
    }

    fn redirect_url(&self, path: &str) -> Result<String> {
        self.frontend_url
            .join(path)
            .map(String::from)
            .map_err(|e| AppError::Internal(format!("invalid redirect url: {e}")))
    }
}

/// Mirror order lines as Checkout line items.
fn checkout_lines(lines: &[OrderLine]) -> Result<Vec<CheckoutLine>> {
    lines
        .iter()
        .map(|line| {
            let mut name = line.product_name.clone();
            let options: Vec<&str> = [line.color.as_deref(), line.size.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if !options.is_empty() {
                name = format!("{name} ({})", options.join(", "));
            }

            Ok(CheckoutLine {
                name,
                unit_amount: line.unit_price.to_minor_units()?,
                quantity: line.quantity,
            })
        })
        .collect()
}

fn session_order(order_id: Option<i32>) -> Result<OrderId> {
    order_id
        .map(OrderId::new)
        .ok_or_else(|| AppError::BadRequest("webhook object has no orderId metadata".to_string()))
}

fn invalid_object(err: serde_json::Error) -> AppError {
    crate::stripe::StripeError::InvalidPayload(err.to_string()).into()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use boutique_core::{OrderLineId, Price, ProductId, VariantId};

    use super::*;

    fn line(color: Option<&str>, size: Option<&str>, cents: i64, quantity: u32) -> OrderLine {
        OrderLine {
            id: OrderLineId::new(1),
            variant_id: VariantId::new(3),
            product_id: ProductId::new(2),
            product_name: "Chemise".to_string(),
            color: color.map(str::to_string),
            size: size.map(str::to_string),
            quantity,
            unit_price: Price::from_cents(cents).unwrap(),
        }
    }

    #[test]
    fn test_checkout_lines_mirror_order() {
        let lines = checkout_lines(&[
            line(Some("Bleu"), Some("M"), 2990, 2),
            line(None, None, 1000, 1),
        ])
        .unwrap();

        assert_eq!(
            lines,
            vec![
                CheckoutLine {
                    name: "Chemise (Bleu, M)".to_string(),
                    unit_amount: 2990,
                    quantity: 2,
                },
                CheckoutLine {
                    name: "Chemise".to_string(),
                    unit_amount: 1000,
                    quantity: 1,
                },
            ]
        );
    }

    #[test]
    fn test_session_order_requires_metadata() {
        assert_eq!(session_order(Some(7)).unwrap(), OrderId::new(7));
        assert!(matches!(session_order(None), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_webhook_outcome_serialization() {
        assert_eq!(
            serde_json::to_string(&WebhookOutcome::Duplicate).unwrap(),
            "\"duplicate\""
        );
    }
}
