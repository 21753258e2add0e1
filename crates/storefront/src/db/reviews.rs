//! Review repository.

use chrono::Utc;
use sqlx::SqliteConnection;

use marvo_core::{ProductId, ReviewId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Review;

/// Repository for product reviews.
pub struct ReviewRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ReviewRepository<'c> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Insert a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        rating: i64,
        comment: Option<&str>,
    ) -> Result<ReviewId, RepositoryError> {
        let id: ReviewId = sqlx::query_scalar(
            r"
            INSERT INTO reviews (user_id, product_id, rating, comment, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(rating)
        .bind(comment)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(conflict_on_unique("review"))?;
        Ok(id)
    }

    /// Reviews of a product with author names, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(&mut self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(
            r"
            SELECT r.id, r.user_id, u.username, r.product_id, r.rating, r.comment, r.created_at
            FROM reviews r
            JOIN users u ON u.id = r.user_id
            WHERE r.product_id = ?
            ORDER BY r.created_at DESC, r.id DESC
            ",
        )
        .bind(product_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(reviews)
    }
}
