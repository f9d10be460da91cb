//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boutique_core::{Email, Role, UserId, VendorId};

/// A user account (domain type).
///
/// The password hash never leaves the repository layer.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// User's email address (unique, normalized).
    pub email: Email,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Default delivery address.
    pub address: Option<String>,
    /// Account role.
    pub role: Role,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// A vendor profile, one-to-one with a `vendor` user.
#[derive(Debug, Clone, Serialize)]
pub struct Vendor {
    /// Vendor ID (referenced by products).
    pub id: VendorId,
    /// Owning user.
    pub user_id: UserId,
    /// Public shop name.
    pub shop_name: String,
    /// Shop description.
    pub description: Option<String>,
    /// When the vendor profile was created.
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller, decoded from the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User ID.
    pub id: UserId,
    /// Role at the time the token was issued.
    pub role: Role,
}

impl CurrentUser {
    /// Whether the caller is an administrator.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the caller owns a resource belonging to `owner`, or is an admin.
    #[must_use]
    pub fn can_access(&self, owner: UserId) -> bool {
        self.id == owner || self.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_or_admin_access() {
        let owner = CurrentUser {
            id: UserId::new(1),
            role: Role::User,
        };
        let admin = CurrentUser {
            id: UserId::new(9),
            role: Role::Admin,
        };
        let stranger = CurrentUser {
            id: UserId::new(2),
            role: Role::Vendor,
        };

        assert!(owner.can_access(UserId::new(1)));
        assert!(admin.can_access(UserId::new(1)));
        assert!(!stranger.can_access(UserId::new(1)));
    }
}
