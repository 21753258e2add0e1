//! Points ledger repository.
//!
//! Entries are only ever inserted. The cached `users.points` balance is
//! kept in step by `services::points::award_points`.

use chrono::Utc;
use sqlx::SqliteConnection;

use marvo_core::{OrderId, PointsReason, UserId};

use super::RepositoryError;
use crate::models::PointsEntry;

/// Repository for points ledger operations.
pub struct PointsRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> PointsRepository<'c> {
    /// Create a new points repository.
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Append a ledger entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn record(
        &mut self,
        user_id: UserId,
        points: i64,
        reason: PointsReason,
        order_id: Option<OrderId>,
    ) -> Result<PointsEntry, RepositoryError> {
        let entry = sqlx::query_as::<_, PointsEntry>(
            r"
            INSERT INTO user_points (user_id, points, reason, order_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, user_id, points, reason, order_id, created_at
            ",
        )
        .bind(user_id)
        .bind(points)
        .bind(reason)
        .bind(order_id)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(entry)
    }

    /// A user's ledger, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&mut self, user_id: UserId) -> Result<Vec<PointsEntry>, RepositoryError> {
        let entries = sqlx::query_as::<_, PointsEntry>(
            r"
            SELECT id, user_id, points, reason, order_id, created_at
            FROM user_points
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(entries)
    }

    /// Sum of every ledger entry for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn ledger_sum(&mut self, user_id: UserId) -> Result<i64, RepositoryError> {
        let sum: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(points), 0) FROM user_points WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&mut *self.conn)
                .await?;
        Ok(sum)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::testing;

    #[tokio::test]
    async fn test_record_and_history() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let user = testing::user(&mut conn, "earner", "EARNER01").await;

        let mut repo = PointsRepository::new(&mut conn);
        repo.record(user, 50, PointsReason::Referral, None).await.unwrap();
        repo.record(user, 5, PointsReason::Review, None).await.unwrap();

        let history = repo.history(user).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].reason, PointsReason::Review, "newest first");
        assert_eq!(repo.ledger_sum(user).await.unwrap(), 55);
    }

    #[tokio::test]
    async fn test_empty_ledger_sums_to_zero() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let user = testing::user(&mut conn, "newbie", "NEWBIE01").await;

        assert_eq!(PointsRepository::new(&mut conn).ledger_sum(user).await.unwrap(), 0);
    }
}
