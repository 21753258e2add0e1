//! Catalog browsing: listing with filters and product detail.

use serde::Deserialize;
use sqlx::SqliteConnection;

use marvo_core::{Category, Price, ProductId};

use crate::db::{ProductRepository, RepositoryError, ReviewRepository};
use crate::models::review::average_rating;
use crate::models::{Product, ProductFilter, Review};

/// Raw listing query string. Every field is optional and unusable values
/// are dropped rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingQuery {
    pub category: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub q: Option<String>,
}

impl ListingQuery {
    /// Convert to a repository filter, ignoring unknown categories,
    /// unparsable prices and blank search text.
    #[must_use]
    pub fn to_filter(&self) -> ProductFilter {
        ProductFilter {
            category: self
                .category
                .as_deref()
                .and_then(|c| c.parse::<Category>().ok()),
            min_price: parse_price(self.min_price.as_deref()),
            max_price: parse_price(self.max_price.as_deref()),
            search: self
                .q
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_owned),
        }
    }
}

fn parse_price(raw: Option<&str>) -> Option<Price> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| Price::parse(s).ok())
}

/// A product page: the product plus its reviews.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub product: Product,
    pub reviews: Vec<Review>,
    pub average_rating: Option<f64>,
}

/// Read-only catalog queries over the caller's connection.
pub struct CatalogService<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CatalogService<'c> {
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Products for the home listing, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&mut self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(&mut *self.conn).list(filter).await
    }

    /// A single product with its reviews.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn product_page(&mut self, id: ProductId) -> Result<ProductPage, RepositoryError> {
        let product = ProductRepository::new(&mut *self.conn)
            .get(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let reviews = ReviewRepository::new(&mut *self.conn)
            .list_for_product(id)
            .await?;
        let average_rating = average_rating(&reviews);
        Ok(ProductPage {
            product,
            reviews,
            average_rating,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::testing;
    use crate::services::reviews::ReviewService;

    #[test]
    fn test_query_to_filter_drops_garbage() {
        let query = ListingQuery {
            category: Some("hats".to_owned()),
            min_price: Some("cheap".to_owned()),
            max_price: Some("-5".to_owned()),
            q: Some("   ".to_owned()),
        };
        assert!(query.to_filter().is_empty());
    }

    #[test]
    fn test_query_to_filter_keeps_valid_values() {
        let query = ListingQuery {
            category: Some("Shoes".to_owned()),
            min_price: Some("100".to_owned()),
            max_price: Some(" 2500.50 ".to_owned()),
            q: Some(" runner ".to_owned()),
        };
        let filter = query.to_filter();
        assert_eq!(filter.category, Some(Category::Shoes));
        assert_eq!(filter.min_price, Some(Price::parse("100").unwrap()));
        assert_eq!(filter.max_price, Some(Price::parse("2500.5").unwrap()));
        assert_eq!(filter.search.as_deref(), Some("runner"));
    }

    #[tokio::test]
    async fn test_product_page_includes_reviews() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", 1).await;
        let a = testing::user(&mut conn, "alpha", "ALPHA001").await;
        let b = testing::user(&mut conn, "bravo", "BRAVO001").await;
        ReviewService::new(&mut conn).post(a, product, 5, None).await.unwrap();
        ReviewService::new(&mut conn).post(b, product, 4, None).await.unwrap();

        let page = CatalogService::new(&mut conn).product_page(product).await.unwrap();
        assert_eq!(page.reviews.len(), 2);
        assert_eq!(page.average_rating, Some(4.5));

        assert!(matches!(
            CatalogService::new(&mut conn).product_page(ProductId::new(404)).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
