//! Loyalty points.
//!
//! [`award_points`] is the only code path that changes a user's balance.
//! It appends a ledger entry and bumps the cached `users.points` in the same
//! unit of work, so the balance always equals the ledger sum.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::SqliteConnection;
use tracing::instrument;

use marvo_core::{OrderId, PointsReason, UserId};

use crate::db::{PointsRepository, RepositoryError, UserRepository};
use crate::models::PointsEntry;

/// Points credited to a referrer when someone signs up with their code.
pub const REFERRAL_BONUS: i64 = 50;

/// Points credited for a user's first review of a product.
pub const REVIEW_POINTS: i64 = 5;

/// Points earned for an order: one per whole currency unit of the item total.
#[must_use]
pub fn points_for_total(total: Decimal) -> i64 {
    total.floor().to_i64().unwrap_or(0).max(0)
}

/// Credit (or debit) a user's balance and record why.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the user does not exist.
/// Returns `RepositoryError::Database` if either write fails.
#[instrument(skip(conn))]
pub async fn award_points(
    conn: &mut SqliteConnection,
    user_id: UserId,
    points: i64,
    reason: PointsReason,
    order_id: Option<OrderId>,
) -> Result<PointsEntry, RepositoryError> {
    let entry = PointsRepository::new(&mut *conn)
        .record(user_id, points, reason, order_id)
        .await?;
    UserRepository::new(&mut *conn)
        .add_points(user_id, points)
        .await?;

    tracing::info!(user_id = %user_id, points, reason = reason.label(), "Points awarded");
    Ok(entry)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::db::testing;

    #[test]
    fn test_points_for_total_floors() {
        assert_eq!(points_for_total(Decimal::from_str("250").unwrap()), 250);
        assert_eq!(points_for_total(Decimal::from_str("99.99").unwrap()), 99);
        assert_eq!(points_for_total(Decimal::from_str("0.50").unwrap()), 0);
        assert_eq!(points_for_total(Decimal::ZERO), 0);
    }

    #[tokio::test]
    async fn test_balance_tracks_ledger() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let user = testing::user(&mut conn, "loyal", "LOYAL001").await;

        award_points(&mut conn, user, REFERRAL_BONUS, PointsReason::Referral, None)
            .await
            .unwrap();
        award_points(&mut conn, user, REVIEW_POINTS, PointsReason::Review, None)
            .await
            .unwrap();

        let balance = UserRepository::new(&mut conn)
            .get_by_id(user)
            .await
            .unwrap()
            .unwrap()
            .points;
        let ledger = PointsRepository::new(&mut conn).ledger_sum(user).await.unwrap();
        assert_eq!(balance, 55);
        assert_eq!(balance, ledger);
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let err = award_points(&mut conn, UserId::new(404), 5, PointsReason::Review, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Database(_) | RepositoryError::NotFound));
    }
}
