//! Product reviews.

use sqlx::SqliteConnection;
use thiserror::Error;
use tracing::instrument;

use marvo_core::{PointsReason, ProductId, ReviewId, UserId};

use crate::db::{ProductRepository, RepositoryError, ReviewRepository};
use crate::services::points::{REVIEW_POINTS, award_points};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("rating must be between 1 and 5")]
    InvalidRating,

    #[error("you have already reviewed this product")]
    AlreadyReviewed,

    #[error("product not found")]
    ProductNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub struct ReviewService<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ReviewService<'c> {
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Post a review and credit [`REVIEW_POINTS`] to its author.
    ///
    /// # Errors
    ///
    /// Returns `ReviewError::InvalidRating` unless `1 <= rating <= 5`.
    /// Returns `ReviewError::ProductNotFound` if the product does not exist.
    /// Returns `ReviewError::AlreadyReviewed` on a second review of the same product.
    #[instrument(skip(self, comment))]
    pub async fn post(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        rating: i64,
        comment: Option<&str>,
    ) -> Result<ReviewId, ReviewError> {
        if !(1..=5).contains(&rating) {
            return Err(ReviewError::InvalidRating);
        }
        if ProductRepository::new(&mut *self.conn)
            .get(product_id)
            .await?
            .is_none()
        {
            return Err(ReviewError::ProductNotFound);
        }

        let comment = comment.map(str::trim).filter(|c| !c.is_empty());
        let id = ReviewRepository::new(&mut *self.conn)
            .create(user_id, product_id, rating, comment)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ReviewError::AlreadyReviewed,
                other => ReviewError::Repository(other),
            })?;

        award_points(&mut *self.conn, user_id, REVIEW_POINTS, PointsReason::Review, None).await?;
        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{UserRepository, testing};

    #[tokio::test]
    async fn test_first_review_earns_points_once() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let user = testing::user(&mut conn, "critic", "CRITIC01").await;
        let product = testing::product(&mut conn, "Tee", "100", 1).await;

        let mut reviews = ReviewService::new(&mut conn);
        reviews.post(user, product, 5, Some(" Great ")).await.unwrap();
        assert!(matches!(
            reviews.post(user, product, 3, None).await,
            Err(ReviewError::AlreadyReviewed)
        ));

        let points = UserRepository::new(&mut conn).get_by_id(user).await.unwrap().unwrap().points;
        assert_eq!(points, REVIEW_POINTS);
    }

    #[tokio::test]
    async fn test_rejects_bad_rating_and_product() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let user = testing::user(&mut conn, "critic", "CRITIC01").await;
        let product = testing::product(&mut conn, "Tee", "100", 1).await;

        let mut reviews = ReviewService::new(&mut conn);
        assert!(matches!(reviews.post(user, product, 0, None).await, Err(ReviewError::InvalidRating)));
        assert!(matches!(reviews.post(user, product, 6, None).await, Err(ReviewError::InvalidRating)));
        assert!(matches!(
            reviews.post(user, ProductId::new(404), 4, None).await,
            Err(ReviewError::ProductNotFound)
        ));
    }
}
