//! The caller's own account.

use sqlx::PgPool;
use tracing::{info, instrument};

use boutique_core::UserId;

use crate::db::users::ProfileUpdate;
use crate::db::{UserRepository, VendorRepository};
use crate::error::{AppError, Result};
use crate::models::{User, Vendor};

/// A user with their vendor profile, if they sell.
#[derive(Debug, serde::Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub vendor: Option<Vendor>,
}

/// Account service.
pub struct UserService<'a> {
    users: UserRepository<'a>,
    vendors: VendorRepository<'a>,
}

impl<'a> UserService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
            vendors: VendorRepository::new(pool),
        }
    }

    /// The caller's profile.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the account was deleted since the token was issued.
    pub async fn me(&self, id: UserId) -> Result<Profile> {
        let user = self
            .users
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
        let vendor = if user.role.can_sell() {
            self.vendors.get_by_user(id).await?
        } else {
            None
        };

        Ok(Profile { user, vendor })
    }

    /// Update profile fields.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` with `NotFound` if the account is gone.
    #[instrument(skip(self, update))]
    pub async fn update(&self, id: UserId, update: &ProfileUpdate) -> Result<User> {
        let user = self.users.update_profile(id, update).await?;
        info!("Profile updated");
        Ok(user)
    }

    /// Delete the account and everything it owns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` with `Conflict` if products of the account
    /// appear in other customers' orders.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: UserId) -> Result<()> {
        self.users.delete_cascade(id).await?;
        info!("Account deleted");
        Ok(())
    }
}
