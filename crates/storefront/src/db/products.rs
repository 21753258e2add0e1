//! Product repository.

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use marvo_core::ProductId;

use super::RepositoryError;
use crate::models::product::ProductRow;
use crate::models::{NewProduct, Product, ProductFilter};

const PRODUCT_COLUMNS: &str = "id, name, description, price, image_url, category, \
                               size_options, color_options, stock, created_at";

/// Repository for product database operations.
pub struct ProductRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ProductRepository<'c> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// List products matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&mut self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let mut query: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1 = 1"));

        if let Some(category) = filter.category {
            query.push(" AND category = ").push_bind(category);
        }
        if let Some(min) = filter.min_price {
            query
                .push(" AND CAST(price AS REAL) >= CAST(")
                .push_bind(min)
                .push(" AS REAL)");
        }
        if let Some(max) = filter.max_price {
            query
                .push(" AND CAST(price AS REAL) <= CAST(")
                .push_bind(max)
                .push(" AS REAL)");
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", escape_like(search));
            query
                .push(" AND (name LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR description LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        let rows = query
            .build_query_as::<ProductRow>()
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Insert a new product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&mut self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let sizes = encode_options(&product.sizes)?;
        let colors = encode_options(&product.colors)?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r"
            INSERT INTO products
                (name, description, price, image_url, category, size_options, color_options, stock, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.image_url)
        .bind(product.category)
        .bind(sizes)
        .bind(colors)
        .bind(product.stock)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(row.into())
    }

    /// Delete a product, returning the removed row.
    ///
    /// Cart lines, reviews and comparisons cascade; order lines keep their
    /// snapshot with a null product reference.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn delete(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "DELETE FROM products WHERE id = ? RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Take `quantity` units out of stock.
    ///
    /// Returns `false` (and changes nothing) when fewer than `quantity`
    /// units remain.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn decrement_stock(
        &mut self,
        id: ProductId,
        quantity: i64,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - ? WHERE id = ? AND stock >= ?",
        )
        .bind(quantity)
        .bind(id)
        .bind(quantity)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Number of products in the catalog.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&mut self) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }
}

fn encode_options(options: &[String]) -> Result<String, RepositoryError> {
    serde_json::to_string(options)
        .map_err(|e| RepositoryError::DataCorruption(format!("cannot encode options: {e}")))
}

/// Escape `LIKE` wildcards so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
