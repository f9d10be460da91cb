//! Refresh token repository.
//!
//! Only SHA-256 hashes of refresh tokens are stored.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use boutique_core::UserId;

use super::RepositoryError;

/// Repository for refresh tokens.
pub struct RefreshTokenRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RefreshTokenRepository<'a> {
    /// Create a new refresh token repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store a token hash inside an existing transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create_in(
        conn: &mut PgConnection,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Revoke a live token and return its owner.
    ///
    /// Returns `None` if the token is unknown, expired or already revoked.
    /// Revoking is atomic, so a token can be exchanged at most once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn consume_in(
        conn: &mut PgConnection,
        token_hash: &str,
    ) -> Result<Option<UserId>, RepositoryError> {
        let user_id: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()
            RETURNING user_id
            ",
        )
        .bind(token_hash)
        .fetch_optional(conn)
        .await?;

        Ok(user_id.map(UserId::new))
    }

    /// Revoke a token. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revoke(&self, token_hash: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(token_hash)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Revoke every live token of a user, signing out all sessions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn revoke_all_in(
        conn: &mut PgConnection,
        user_id: UserId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }
}
