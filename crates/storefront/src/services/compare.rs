//! Per-user product comparison list.

use sqlx::SqliteConnection;

use marvo_core::{ProductId, UserId};

use crate::db::{ComparisonRepository, ProductRepository, RepositoryError};
use crate::models::Product;

pub struct CompareService<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CompareService<'c> {
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Add a product to the list. Returns the product so callers can name it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn add(&mut self, user_id: UserId, product_id: ProductId) -> Result<Product, RepositoryError> {
        let product = ProductRepository::new(&mut *self.conn)
            .get(product_id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        ComparisonRepository::new(&mut *self.conn)
            .add(user_id, product_id)
            .await?;
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove(&mut self, user_id: UserId, product_id: ProductId) -> Result<bool, RepositoryError> {
        ComparisonRepository::new(&mut *self.conn)
            .remove(user_id, product_id)
            .await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&mut self, user_id: UserId) -> Result<Vec<Product>, RepositoryError> {
        ComparisonRepository::new(&mut *self.conn)
            .list_products(user_id)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::testing;

    #[tokio::test]
    async fn test_add_unknown_product() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let user = testing::user(&mut conn, "shopper", "SHOPPER1").await;

        assert!(matches!(
            CompareService::new(&mut conn).add(user, ProductId::new(1)).await,
            Err(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_add_list_remove() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let user = testing::user(&mut conn, "shopper", "SHOPPER1").await;
        let product = testing::product(&mut conn, "Tee", "100", 1).await;

        let mut compare = CompareService::new(&mut conn);
        assert_eq!(compare.add(user, product).await.unwrap().name, "Tee");
        compare.add(user, product).await.unwrap();
        assert_eq!(compare.list(user).await.unwrap().len(), 1);
        assert!(compare.remove(user, product).await.unwrap());
        assert!(compare.list(user).await.unwrap().is_empty());
    }
}
