//! Order placement and lifecycle.
//!
//! Placing an order prices every line, stores the order with its lines and
//! notifies the customer in one transaction. Stock is checked here and only
//! decremented when payment is confirmed (see [`super::payments`]).

use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, instrument};

use boutique_core::{LineAmount, OrderId, OrderStatus, UserId, VariantId, order_total};

use crate::db::orders::NewOrder;
use crate::db::products::PricedVariant;
use crate::db::{
    CartRepository, NotificationRepository, OrderRepository, PaymentRepository, ProductRepository,
};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::{CurrentUser, Order, OrderDetail, PageParams, Paginated};
use crate::services::notifications::messages;
use crate::services::payments::{Confirmation, Confirmed, confirm_order};

/// One requested line.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OrderItemInput {
    pub variant_id: VariantId,
    pub quantity: i32,
}

/// Order placement form. Without `items`, the cart is ordered.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub items: Option<Vec<OrderItemInput>>,
    pub delivery_address: String,
    pub payment_method: String,
}

/// Order service.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    orders: OrderRepository<'a>,
    payments: PaymentRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            orders: OrderRepository::new(pool),
            payments: PaymentRepository::new(pool),
        }
    }

    /// Place an order in `En attente`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an empty cart, a blank address or
    /// a variant without enough stock, `AppError::Pricing` for duplicate or
    /// zero-quantity lines and `AppError::NotFound` for an unknown variant.
    #[instrument(skip(self, form))]
    pub async fn place(&self, user_id: UserId, form: &PlaceOrder) -> Result<OrderDetail> {
        let delivery_address = required(&form.delivery_address, "delivery_address")?;
        let payment_method = required(&form.payment_method, "payment_method")?;

        let (requested, from_cart) = match &form.items {
            Some(items) => (
                items
                    .iter()
                    .map(|item| Ok((item.variant_id, quantity(item.quantity)?)))
                    .collect::<Result<Vec<_>>>()?,
                false,
            ),
            None => {
                let cart = CartRepository::new(self.pool).items(user_id).await?;
                if cart.is_empty() {
                    return Err(AppError::BadRequest("your cart is empty".to_string()));
                }
                (
                    cart.iter()
                        .map(|item| (item.variant_id, item.quantity))
                        .collect(),
                    true,
                )
            }
        };

        let ids: Vec<VariantId> = requested.iter().map(|(id, _)| *id).collect();

        let mut tx = self.pool.begin().await?;

        let priced = ProductRepository::priced_variants_in(&mut *tx, &ids).await?;
        let lines = price_lines(&requested, &priced)?;
        let total_price = order_total(&lines)?;

        let order = OrderRepository::create_in(
            &mut *tx,
            &NewOrder {
                user_id,
                total_price,
                delivery_address,
                payment_method,
            },
        )
        .await?;

        for line in &lines {
            OrderRepository::insert_line_in(
                &mut *tx,
                order.id,
                line.variant_id,
                line.quantity,
                line.unit_price,
            )
            .await?;
        }

        NotificationRepository::create_in(&mut *tx, user_id, &messages::order_created(order.id))
            .await?;

        if from_cart {
            CartRepository::clear_in(&mut *tx, user_id).await?;
        }

        let items = OrderRepository::lines_in(&mut *tx, order.id).await?;
        tx.commit().await?;

        info!(order_id = %order.id, total = %order.total_price, lines = items.len(), "Order placed");
        let order_ref = order.id.to_string();
        add_breadcrumb("order", "Order placed", Some(&[("order_id", order_ref.as_str())]));

        Ok(OrderDetail {
            order,
            items,
            payment: None,
        })
    }

    /// The caller's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_own(&self, user_id: UserId, params: PageParams) -> Result<Paginated<Order>> {
        let (items, total) = self
            .orders
            .list_for_user(user_id, params.limit(), params.offset())
            .await?;
        Ok(Paginated::new(items, params, total))
    }

    /// An order with its lines and payment. Visible to its owner and admins.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` or `AppError::Forbidden`.
    pub async fn get(&self, user: &CurrentUser, id: OrderId) -> Result<OrderDetail> {
        let order = self.find(id).await?;
        if !user.can_access(order.user_id) {
            return Err(AppError::Forbidden("You can only view your own orders".to_string()));
        }

        let items = self.orders.lines(id).await?;
        let payment = self.payments.get_by_order(id).await?;

        Ok(OrderDetail {
            order,
            items,
            payment,
        })
    }

    /// Cancel one of the caller's orders while it is still pending.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` for someone else's order and
    /// `AppError::Transition` once the order has left `En attente`.
    #[instrument(skip(self), fields(user_id = %user.id))]
    pub async fn cancel(&self, user: &CurrentUser, id: OrderId) -> Result<Order> {
        let mut tx = self.pool.begin().await?;

        let order = OrderRepository::lock_in(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
        if order.user_id != user.id {
            return Err(AppError::Forbidden("You can only cancel your own orders".to_string()));
        }
        order.status.transition_to(OrderStatus::Cancelled)?;

        let cancelled =
            OrderRepository::transition_in(&mut *tx, id, order.status, OrderStatus::Cancelled)
                .await?
                .ok_or_else(|| AppError::Conflict(format!("order {id} changed concurrently")))?;
        NotificationRepository::create_in(&mut *tx, order.user_id, &messages::order_cancelled(id))
            .await?;

        tx.commit().await?;

        info!(order_id = %id, "Order cancelled");

        Ok(cancelled)
    }

    /// Every order, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn list_all(
        &self,
        status: Option<OrderStatus>,
        params: PageParams,
    ) -> Result<Paginated<Order>> {
        let (items, total) = self
            .orders
            .list_all(status, params.limit(), params.offset())
            .await?;
        Ok(Paginated::new(items, params, total))
    }

    /// Move an order to `status` on behalf of an admin.
    ///
    /// `Payé` runs the full payment confirmation.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transition` if the change is not allowed.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        if status == OrderStatus::Paid {
            return self.confirm_payment(id).await;
        }

        let mut tx = self.pool.begin().await?;

        let order = OrderRepository::lock_in(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
        order.status.transition_to(status)?;

        let updated = OrderRepository::transition_in(&mut *tx, id, order.status, status)
            .await?
            .ok_or_else(|| AppError::Conflict(format!("order {id} changed concurrently")))?;
        NotificationRepository::create_in(
            &mut *tx,
            order.user_id,
            &messages::status_changed(id, status),
        )
        .await?;

        tx.commit().await?;

        info!(order_id = %id, from = %order.status, to = %status, "Order status changed");

        Ok(updated)
    }

    /// Confirm payment without Stripe, as the webhook would.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Transition` if the order can't be paid and
    /// `AppError::Conflict` if stock ran out.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, id: OrderId) -> Result<Order> {
        let order = self.find(id).await?;
        order.status.transition_to(OrderStatus::Paid)?;

        let confirmed = confirm_order(
            self.pool,
            Confirmation {
                order_id: id,
                event: None,
                payment_intent_id: None,
                checkout_session_id: None,
            },
        )
        .await?;

        match confirmed {
            Confirmed::Paid { order, .. } => Ok(order),
            Confirmed::NotPayable { status, .. } => Err(AppError::Conflict(format!(
                "order {id} is already {status}"
            ))),
            Confirmed::Duplicate => Err(AppError::Internal(
                "manual confirmation reported a duplicate event".to_string(),
            )),
        }
    }

    async fn find(&self, id: OrderId) -> Result<Order> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }
}

/// Attach current prices to requested lines and check stock.
fn price_lines(requested: &[(VariantId, u32)], priced: &[PricedVariant]) -> Result<Vec<LineAmount>> {
    requested
        .iter()
        .map(|&(variant_id, quantity)| {
            let variant = priced
                .iter()
                .find(|v| v.variant_id == variant_id)
                .ok_or_else(|| AppError::NotFound(format!("variant {variant_id} not found")))?;

            if variant.stock < quantity {
                return Err(AppError::BadRequest(format!(
                    "insufficient stock for {} (variant {variant_id}): {} available",
                    variant.product_name, variant.stock
                )));
            }

            Ok(LineAmount {
                variant_id,
                unit_price: variant.unit_price,
                quantity,
            })
        })
        .collect()
}

fn quantity(value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| AppError::BadRequest("quantity must be at least 1".to_string()))
}

fn required<'f>(value: &'f str, field: &str) -> Result<&'f str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use boutique_core::{Price, PricingError, ProductId};

    use super::*;

    fn variant(id: i32, stock: u32, cents: i64) -> PricedVariant {
        PricedVariant {
            variant_id: VariantId::new(id),
            product_id: ProductId::new(1),
            product_name: "Robe".to_string(),
            stock,
            unit_price: Price::from_cents(cents).unwrap(),
        }
    }

    #[test]
    fn test_price_lines_uses_current_prices() {
        let lines = price_lines(
            &[(VariantId::new(1), 2), (VariantId::new(2), 1)],
            &[variant(1, 5, 4500), variant(2, 1, 1200)],
        )
        .unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(
            order_total(&lines).unwrap(),
            Price::from_cents(10200).unwrap()
        );
    }

    #[test]
    fn test_insufficient_stock_is_bad_request() {
        let err = price_lines(&[(VariantId::new(1), 6)], &[variant(1, 5, 4500)]).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("5 available")));
    }

    #[test]
    fn test_unknown_variant_is_not_found() {
        let err = price_lines(&[(VariantId::new(9), 1)], &[variant(1, 5, 4500)]).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_duplicate_lines_rejected_when_totalling() {
        let lines = price_lines(
            &[(VariantId::new(1), 1), (VariantId::new(1), 1)],
            &[variant(1, 5, 4500)],
        )
        .unwrap();
        assert_eq!(
            order_total(&lines),
            Err(PricingError::DuplicateVariant(VariantId::new(1)))
        );
    }

    #[test]
    fn test_negative_quantity_and_blank_fields() {
        assert!(quantity(-1).is_err());
        assert_eq!(quantity(0).unwrap(), 0);
        assert!(required("   ", "delivery_address").is_err());
        assert_eq!(required(" 1 rue de Rivoli ", "delivery_address").unwrap(), "1 rue de Rivoli");
    }

    #[test]
    fn test_place_order_form() {
        let form: PlaceOrder = serde_json::from_str(
            r#"{"delivery_address": "Paris", "payment_method": "card"}"#,
        )
        .unwrap();
        assert!(form.items.is_none());
    }
}
