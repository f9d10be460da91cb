//! Roles and lifecycle statuses.
//!
//! Order and payment statuses serialize to the French labels the dashboard
//! displays (`"En attente"`, `"Payé"`, ...). The same labels are the values of
//! the `order_status` and `payment_status` Postgres enums.
//!
//! # Order lifecycle
//!
//! ```text
//! En attente ──► Payé ──► Expédiée ──► Livrée
//!     │           │                      ▲
//!     │           └──────────────────────┘
//!     ├──► Annulée
//!     └──► Échec du paiement
//! ```
//!
//! # Payment lifecycle
//!
//! ```text
//! En attente ──► Payé ──► Remboursé
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a status change is not allowed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot change status from {from} to {to}")]
pub struct TransitionError {
    /// Current status label.
    pub from: String,
    /// Requested status label.
    pub to: String,
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A shopper.
    #[default]
    User,
    /// A seller who owns products and sees revenue analytics.
    Vendor,
    /// Full access to every resource.
    Admin,
}

impl Role {
    /// Whether this role may create and manage products.
    #[must_use]
    pub const fn can_sell(self) -> bool {
        matches!(self, Self::Vendor | Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Vendor => write!(f, "vendor"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "vendor" => Ok(Self::Vendor),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "order_status"))]
pub enum OrderStatus {
    /// Created, awaiting payment.
    #[default]
    #[serde(rename = "En attente")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "En attente"))]
    Pending,
    /// Payment confirmed, stock decremented.
    #[serde(rename = "Payé")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Payé"))]
    Paid,
    /// Handed to the carrier.
    #[serde(rename = "Expédiée")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Expédiée"))]
    Shipped,
    /// Received by the customer.
    #[serde(rename = "Livrée")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Livrée"))]
    Delivered,
    /// Cancelled before payment.
    #[serde(rename = "Annulée")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Annulée"))]
    Cancelled,
    /// The checkout session expired. A late successful charge still settles it.
    #[serde(rename = "Échec du paiement")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Échec du paiement"))]
    PaymentFailed,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Paid,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::PaymentFailed,
    ];

    /// The wire and database label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "En attente",
            Self::Paid => "Payé",
            Self::Shipped => "Expédiée",
            Self::Delivered => "Livrée",
            Self::Cancelled => "Annulée",
            Self::PaymentFailed => "Échec du paiement",
        }
    }

    /// Terminal statuses accept no further change.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether the order has been paid for (counts toward revenue).
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Paid | Self::Shipped | Self::Delivered)
    }

    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::Paid | Self::Cancelled | Self::PaymentFailed
            ) | (Self::Paid, Self::Shipped | Self::Delivered)
                | (Self::Shipped, Self::Delivered)
                | (Self::PaymentFailed, Self::Paid)
        )
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` if the move is not allowed.
    pub fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self.label().to_owned(),
                to: next.label().to_owned(),
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.label() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "payment_status"))]
pub enum PaymentStatus {
    /// Recorded but not settled.
    #[default]
    #[serde(rename = "En attente")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "En attente"))]
    Pending,
    /// Settled.
    #[serde(rename = "Payé")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Payé"))]
    Paid,
    /// Refunded through Stripe. Terminal.
    #[serde(rename = "Remboursé")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Remboursé"))]
    Refunded,
}

impl PaymentStatus {
    /// The wire and database label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "En attente",
            Self::Paid => "Payé",
            Self::Refunded => "Remboursé",
        }
    }

    /// Whether moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid) | (Self::Paid, Self::Refunded)
        )
    }

    /// Validate a transition.
    ///
    /// # Errors
    ///
    /// Returns `TransitionError` if the move is not allowed. A refunded
    /// payment rejects every change.
    pub fn transition_to(self, next: Self) -> Result<Self, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self.label().to_owned(),
                to: next.label().to_owned(),
            })
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_labels_roundtrip() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.label()));
            assert_eq!(status.label().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_pending_order_transitions() {
        let pending = OrderStatus::Pending;
        assert!(pending.can_transition_to(OrderStatus::Paid));
        assert!(pending.can_transition_to(OrderStatus::Cancelled));
        assert!(pending.can_transition_to(OrderStatus::PaymentFailed));
        assert!(!pending.can_transition_to(OrderStatus::Delivered));
        assert!(!pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_terminal_orders_are_frozen() {
        for terminal in [OrderStatus::Delivered, OrderStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in OrderStatus::ALL {
                assert!(terminal.transition_to(next).is_err());
            }
        }
    }

    #[test]
    fn test_failed_payment_can_still_settle() {
        assert!(!OrderStatus::PaymentFailed.is_terminal());
        assert_eq!(
            OrderStatus::PaymentFailed.transition_to(OrderStatus::Paid),
            Ok(OrderStatus::Paid)
        );
        for next in [
            OrderStatus::Pending,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert!(OrderStatus::PaymentFailed.transition_to(next).is_err());
        }
    }

    #[test]
    fn test_paid_order_cannot_be_cancelled() {
        let err = OrderStatus::Paid
            .transition_to(OrderStatus::Cancelled)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot change status from Payé to Annulée");
    }

    #[test]
    fn test_refunded_payment_rejects_changes() {
        assert!(PaymentStatus::Paid.can_transition_to(PaymentStatus::Refunded));
        for next in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Refunded,
        ] {
            assert!(PaymentStatus::Refunded.transition_to(next).is_err());
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("vendor".parse::<Role>().unwrap(), Role::Vendor);
        assert!("root".parse::<Role>().is_err());
        assert!(Role::Admin.can_sell());
        assert!(!Role::User.can_sell());
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }
}
