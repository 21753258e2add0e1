//! Product review type.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use marvo_core::{ProductId, ReviewId, UserId, Username};

/// A review joined with its author's username.
#[derive(Debug, Clone, FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub username: Username,
    pub product_id: ProductId,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Mean rating rounded to one decimal place, or `None` without reviews.
#[must_use]
pub fn average_rating(reviews: &[Review]) -> Option<f64> {
    if reviews.is_empty() {
        return None;
    }
    let sum: i64 = reviews.iter().map(|r| r.rating).sum();
    #[allow(clippy::cast_precision_loss)] // review counts are tiny
    let mean = sum as f64 / reviews.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}
