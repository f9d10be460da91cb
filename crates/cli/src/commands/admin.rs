//! Admin user management.
//!
//! Registration never grants the admin role, so the first admin is promoted
//! from an existing account here:
//!
//! ```bash
//! bq-cli admin promote -e owner@example.com
//! ```

use boutique_core::{Email, Role};
use thiserror::Error;

use super::{ConnectError, connect};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account with that email.
    #[error("No user registered with email: {0}")]
    UserNotFound(String),
}

/// Promote the account registered with `email` to admin.
///
/// Returns the previous role. Promoting an admin is a no-op.
pub async fn promote(email: &str) -> Result<Role, AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;

    let pool = connect().await?;

    let previous: Option<Role> =
        sqlx::query_scalar("SELECT role FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&pool)
            .await?;

    let previous = previous.ok_or_else(|| AdminError::UserNotFound(email.to_string()))?;

    if previous == Role::Admin {
        tracing::info!(%email, "User is already an admin");
        return Ok(previous);
    }

    sqlx::query("UPDATE users SET role = $1, updated_at = NOW() WHERE email = $2")
        .bind(Role::Admin)
        .bind(&email)
        .execute(&pool)
        .await?;

    tracing::info!(%email, from = %previous, "User promoted to admin");
    Ok(previous)
}
