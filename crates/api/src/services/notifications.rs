//! In-app notifications.
//!
//! Notifications are written by the order and payment flows inside their own
//! transactions; this service only serves the user-facing inbox.

use sqlx::PgPool;

use boutique_core::{NotificationId, OrderId, OrderStatus, UserId};

use crate::db::NotificationRepository;
use crate::error::Result;
use crate::models::{Notification, PageParams, Paginated};

/// Notification texts shown to customers.
pub mod messages {
    use super::{OrderId, OrderStatus};

    #[must_use]
    pub fn order_created(order_id: OrderId) -> String {
        format!("Votre commande n°{order_id} a été créée.")
    }

    #[must_use]
    pub fn payment_confirmed(order_id: OrderId) -> String {
        format!("Votre paiement pour la commande n°{order_id} a été confirmé.")
    }

    #[must_use]
    pub fn payment_failed(order_id: OrderId) -> String {
        format!("Le paiement de la commande n°{order_id} a échoué.")
    }

    #[must_use]
    pub fn payment_declined(order_id: OrderId) -> String {
        format!("Le paiement de la commande n°{order_id} a été refusé. Vous pouvez réessayer.")
    }

    #[must_use]
    pub fn payment_refunded(order_id: OrderId) -> String {
        format!("Votre paiement pour la commande n°{order_id} a été remboursé.")
    }

    #[must_use]
    pub fn order_cancelled(order_id: OrderId) -> String {
        format!("Votre commande n°{order_id} a été annulée.")
    }

    #[must_use]
    pub fn status_changed(order_id: OrderId, status: OrderStatus) -> String {
        format!(
            "Le statut de votre commande n°{order_id} est maintenant : {}.",
            status.label()
        )
    }
}

/// A page of notifications with the unread count.
#[derive(Debug, serde::Serialize)]
pub struct Inbox {
    #[serde(flatten)]
    pub page: Paginated<Notification>,
    pub unread: u64,
}

/// Notification inbox service.
pub struct NotificationService<'a> {
    notifications: NotificationRepository<'a>,
}

impl<'a> NotificationService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            notifications: NotificationRepository::new(pool),
        }
    }

    /// A page of the user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a query fails.
    pub async fn inbox(&self, user_id: UserId, params: PageParams) -> Result<Inbox> {
        let (items, total) = self
            .notifications
            .list(user_id, params.limit(), params.offset())
            .await?;
        let unread = self.notifications.unread_count(user_id).await?;

        Ok(Inbox {
            page: Paginated::new(items, params, total),
            unread,
        })
    }

    /// Mark one notification as read.
    ///
    /// # Errors
    ///
    /// Returns 404 if the user has no such notification.
    pub async fn mark_read(&self, user_id: UserId, id: NotificationId) -> Result<Notification> {
        Ok(self.notifications.mark_read(user_id, id).await?)
    }

    /// Mark all notifications as read, returning how many changed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if the query fails.
    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64> {
        Ok(self.notifications.mark_all_read(user_id).await?)
    }

    /// Delete a notification.
    ///
    /// # Errors
    ///
    /// Returns 404 if the user has no such notification.
    pub async fn delete(&self, user_id: UserId, id: NotificationId) -> Result<()> {
        Ok(self.notifications.delete(user_id, id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let id = OrderId::new(17);
        assert_eq!(messages::order_created(id), "Votre commande n°17 a été créée.");
        assert_eq!(
            messages::status_changed(id, OrderStatus::Shipped),
            "Le statut de votre commande n°17 est maintenant : Expédiée."
        );
        assert_eq!(
            messages::payment_refunded(id),
            "Votre paiement pour la commande n°17 a été remboursé."
        );
    }
}
