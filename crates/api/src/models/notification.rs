//! Notification domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use boutique_core::{NotificationId, UserId};

/// An in-app notification.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
