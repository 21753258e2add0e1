//! Cart line repository.
//!
//! Lines are keyed by the opaque cart token stored in the visitor's
//! session, not by user, so a cart survives login and logout.

use chrono::Utc;
use sqlx::SqliteConnection;

use marvo_core::{CartItemId, ProductId};

use super::RepositoryError;
use crate::models::{CartItem, CartLine};

const ITEM_COLUMNS: &str = "id, session_id, product_id, quantity, size, color, added_at";

/// Repository for cart database operations.
pub struct CartRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CartRepository<'c> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Find the line for an exact (product, size, color) combination.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_line(
        &mut self,
        token: &str,
        product_id: ProductId,
        size: Option<&str>,
        color: Option<&str>,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let item = sqlx::query_as::<_, CartItem>(&format!(
            r"
            SELECT {ITEM_COLUMNS} FROM cart_items
            WHERE session_id = ? AND product_id = ? AND size IS ? AND color IS ?
            "
        ))
        .bind(token)
        .bind(product_id)
        .bind(size)
        .bind(color)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(item)
    }

    /// Insert a new cart line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(
        &mut self,
        token: &str,
        product_id: ProductId,
        quantity: i64,
        size: Option<&str>,
        color: Option<&str>,
    ) -> Result<CartItem, RepositoryError> {
        let item = sqlx::query_as::<_, CartItem>(&format!(
            r"
            INSERT INTO cart_items (session_id, product_id, quantity, size, color, added_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {ITEM_COLUMNS}
            "
        ))
        .bind(token)
        .bind(product_id)
        .bind(quantity)
        .bind(size)
        .bind(color)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await?;
        Ok(item)
    }

    /// Replace the quantity of an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_quantity(&mut self, id: CartItemId, quantity: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE cart_items SET quantity = ? WHERE id = ?")
            .bind(quantity)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Get a line by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&mut self, id: CartItemId) -> Result<Option<CartItem>, RepositoryError> {
        let item = sqlx::query_as::<_, CartItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM cart_items WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(item)
    }

    /// Delete a line, but only if it belongs to `token`.
    ///
    /// Returns `false` if nothing was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&mut self, token: &str, id: CartItemId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ? AND session_id = ?")
            .bind(id)
            .bind(token)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All lines for a cart token joined with live product data, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines_for_session(&mut self, token: &str) -> Result<Vec<CartLine>, RepositoryError> {
        let lines = sqlx::query_as::<_, CartLine>(
            r"
            SELECT c.id, c.product_id, p.name AS product_name, p.price AS unit_price,
                   p.image_url, p.stock, c.quantity, c.size, c.color
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.session_id = ?
            ORDER BY c.added_at, c.id
            ",
        )
        .bind(token)
        .fetch_all(&mut *self.conn)
        .await?;
        Ok(lines)
    }

    /// Total number of units in a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn unit_count(&mut self, token: &str) -> Result<i64, RepositoryError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(quantity), 0) FROM cart_items WHERE session_id = ?")
                .bind(token)
                .fetch_one(&mut *self.conn)
                .await?;
        Ok(count)
    }

    /// Remove every line of a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn clear_session(&mut self, token: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE session_id = ?")
            .bind(token)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::testing;

    #[tokio::test]
    async fn test_find_line_matches_null_variants() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", 10).await;

        let mut repo = CartRepository::new(&mut conn);
        let plain = repo.insert("tok", product, 1, None, None).await.unwrap();
        let sized = repo.insert("tok", product, 2, Some("M"), None).await.unwrap();

        assert_eq!(repo.find_line("tok", product, None, None).await.unwrap().unwrap().id, plain.id);
        assert_eq!(
            repo.find_line("tok", product, Some("M"), None).await.unwrap().unwrap().id,
            sized.id
        );
        assert!(repo.find_line("tok", product, Some("L"), None).await.unwrap().is_none());
        assert!(repo.find_line("other", product, None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lines_join_live_product_data() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let a = testing::product(&mut conn, "Tee", "100", 10).await;
        let b = testing::product(&mut conn, "Jeans", "850.25", 4).await;

        let mut repo = CartRepository::new(&mut conn);
        repo.insert("tok", a, 2, Some("S"), Some("Red")).await.unwrap();
        repo.insert("tok", b, 1, None, None).await.unwrap();
        repo.insert("else", b, 3, None, None).await.unwrap();

        let lines = repo.lines_for_session("tok").await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_name, "Tee");
        assert_eq!(lines[0].line_total().unwrap().to_string(), "200");
        assert_eq!(lines[1].stock, 4);
        assert_eq!(repo.unit_count("tok").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_delete_is_scoped_to_token() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", 10).await;

        let mut repo = CartRepository::new(&mut conn);
        let line = repo.insert("mine", product, 1, None, None).await.unwrap();

        assert!(!repo.delete("theirs", line.id).await.unwrap());
        assert!(repo.delete("mine", line.id).await.unwrap());
        assert!(repo.get(line.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_quantity_and_clear() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", 10).await;

        let mut repo = CartRepository::new(&mut conn);
        let line = repo.insert("tok", product, 1, None, None).await.unwrap();
        repo.set_quantity(line.id, 4).await.unwrap();
        assert_eq!(repo.get(line.id).await.unwrap().unwrap().quantity, 4);

        assert_eq!(repo.clear_session("tok").await.unwrap(), 1);
        assert!(repo.lines_for_session("tok").await.unwrap().is_empty());
        assert_eq!(repo.unit_count("tok").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_lines_disappear_with_product() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", 10).await;

        CartRepository::new(&mut conn)
            .insert("tok", product, 1, None, None)
            .await
            .unwrap();
        crate::db::ProductRepository::new(&mut conn)
            .delete(product)
            .await
            .unwrap();

        assert!(CartRepository::new(&mut conn)
            .lines_for_session("tok")
            .await
            .unwrap()
            .is_empty());
    }
}
