//! Processed Stripe webhook events.
//!
//! Stripe delivers events at least once. Recording the event ID in the same
//! transaction as its side effects makes redelivery a no-op.

use sqlx::PgConnection;

use super::RepositoryError;

/// Repository for processed webhook events.
pub struct StripeEventRepository;

impl StripeEventRepository {
    /// Record an event ID.
    ///
    /// Returns `false` if the event was already recorded.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_in(
        conn: &mut PgConnection,
        event_id: &str,
        event_type: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO stripe_events (id, event_type) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
        )
        .bind(event_id)
        .bind(event_type)
        .execute(conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
