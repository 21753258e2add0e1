//! Product comparison list repository.

use chrono::Utc;
use sqlx::SqliteConnection;

use marvo_core::{ProductId, UserId};

use super::RepositoryError;
use crate::models::Product;
use crate::models::product::ProductRow;

/// Repository for per-user comparison lists.
pub struct ComparisonRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ComparisonRepository<'c> {
    /// Create a new comparison repository.
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Add a product to the user's list. Adding twice is a no-op.
    ///
    /// Returns `true` if the product was newly added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO comparisons (user_id, product_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a product from the user's list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM comparisons WHERE user_id = ? AND product_id = ?")
            .bind(user_id)
            .bind(product_id)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Products on the user's list in the order they were added.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(&mut self, user_id: UserId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.name, p.description, p.price, p.image_url, p.category,
                   p.size_options, p.color_options, p.stock, p.created_at
            FROM comparisons c
            JOIN products p ON p.id = c.product_id
            WHERE c.user_id = ?
            ORDER BY c.created_at, c.id
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::testing;

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let user = testing::user(&mut conn, "shopper", "SHOPPER1").await;
        let a = testing::product(&mut conn, "Tee", "100", 1).await;
        let b = testing::product(&mut conn, "Polo", "200", 1).await;

        let mut repo = ComparisonRepository::new(&mut conn);
        assert!(repo.add(user, a).await.unwrap());
        assert!(!repo.add(user, a).await.unwrap());
        assert!(repo.add(user, b).await.unwrap());

        let products = repo.list_products(user).await.unwrap();
        assert_eq!(
            products.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["Tee", "Polo"]
        );

        assert!(repo.remove(user, a).await.unwrap());
        assert!(!repo.remove(user, a).await.unwrap());
        assert_eq!(repo.list_products(user).await.unwrap().len(), 1);
    }
}
