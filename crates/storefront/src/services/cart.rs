//! Cart service.
//!
//! Carts are keyed by an opaque token kept in the visitor's session.

use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use thiserror::Error;
use tracing::instrument;

use marvo_core::{CartItemId, ProductId};

use crate::db::{CartRepository, ProductRepository, RepositoryError};
use crate::models::CartLine;
use crate::models::cart::cart_total;

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("product not found")]
    ProductNotFound,

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("requested quantity is not available")]
    InsufficientStock,

    #[error("cart item not found")]
    ItemNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A request to put a product in the cart.
#[derive(Debug, Clone, Copy)]
pub struct AddToCart<'a> {
    pub product_id: ProductId,
    pub quantity: i64,
    pub size: Option<&'a str>,
    pub color: Option<&'a str>,
}

/// The contents of a cart priced at live product prices.
#[derive(Debug, Clone, Default)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    /// `None` when the total does not fit in a `Decimal`.
    pub total: Option<Decimal>,
}

impl CartView {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn unit_count(&self) -> i64 {
        self.lines
            .iter()
            .fold(0, |count, line| count.saturating_add(line.quantity))
    }
}

/// Cart service over the caller's connection or transaction.
pub struct CartService<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CartService<'c> {
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Add a product, merging with an existing line for the same
    /// (product, size, color) combination.
    ///
    /// Blank size or color strings are treated as "none". The line is left
    /// unchanged when the merged quantity would exceed stock.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` if `quantity < 1`.
    /// Returns `CartError::ProductNotFound` if the product does not exist.
    /// Returns `CartError::InsufficientStock` if stock cannot cover the result.
    #[instrument(skip(self, token), fields(product_id = %request.product_id, quantity = request.quantity))]
    pub async fn add(&mut self, token: &str, request: AddToCart<'_>) -> Result<CartLineRef, CartError> {
        if request.quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        let size = non_blank(request.size);
        let color = non_blank(request.color);

        let product = ProductRepository::new(&mut *self.conn)
            .get(request.product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;
        if request.quantity > product.stock {
            return Err(CartError::InsufficientStock);
        }

        let mut cart = CartRepository::new(&mut *self.conn);
        if let Some(existing) = cart.find_line(token, product.id, size, color).await? {
            let merged = existing
                .quantity
                .checked_add(request.quantity)
                .filter(|merged| *merged <= product.stock)
                .ok_or(CartError::InsufficientStock)?;
            cart.set_quantity(existing.id, merged).await?;
            return Ok(CartLineRef {
                id: existing.id,
                product_name: product.name,
                quantity: merged,
            });
        }

        let item = cart
            .insert(token, product.id, request.quantity, size, color)
            .await?;
        Ok(CartLineRef {
            id: item.id,
            product_name: product.name,
            quantity: item.quantity,
        })
    }

    /// Current cart lines and total. A total too large to represent is
    /// left unset and logged rather than failing the page.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn view(&mut self, token: &str) -> Result<CartView, CartError> {
        let lines = CartRepository::new(&mut *self.conn)
            .lines_for_session(token)
            .await?;
        let total = match cart_total(&lines) {
            Ok(total) => Some(total),
            Err(e) => {
                tracing::warn!(error = %e, lines = lines.len(), "Cart total overflowed");
                None
            }
        };
        Ok(CartView { lines, total })
    }

    /// Remove a line. Lines belonging to another cart are left alone.
    ///
    /// Returns `true` if the line was removed.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if no line has this ID.
    #[instrument(skip(self, token))]
    pub async fn remove(&mut self, token: &str, id: CartItemId) -> Result<bool, CartError> {
        let mut cart = CartRepository::new(&mut *self.conn);
        let item = cart.get(id).await?.ok_or(CartError::ItemNotFound)?;
        if item.session_id != token {
            tracing::debug!(cart_item_id = %id, "Ignoring removal of another cart's line");
            return Ok(false);
        }
        Ok(cart.delete(token, id).await?)
    }

    /// Number of units in the cart, for the navigation badge.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if the query fails.
    pub async fn unit_count(&mut self, token: &str) -> Result<i64, CartError> {
        Ok(CartRepository::new(&mut *self.conn).unit_count(token).await?)
    }
}

/// The line touched by a successful add.
#[derive(Debug, Clone)]
pub struct CartLineRef {
    pub id: CartItemId,
    pub product_name: String,
    pub quantity: i64,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::testing;

    fn add(product_id: ProductId, quantity: i64) -> AddToCart<'static> {
        AddToCart {
            product_id,
            quantity,
            size: None,
            color: None,
        }
    }

    #[tokio::test]
    async fn test_add_merges_same_variant() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", 5).await;

        let mut cart = CartService::new(&mut conn);
        let first = cart.add("tok", add(product, 2)).await.unwrap();
        let second = cart.add("tok", add(product, 3)).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);

        let view = cart.view("tok").await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.total.unwrap().to_string(), "500");
    }

    #[tokio::test]
    async fn test_blank_variant_matches_none() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", 5).await;

        let mut cart = CartService::new(&mut conn);
        cart.add("tok", add(product, 1)).await.unwrap();
        cart.add(
            "tok",
            AddToCart {
                size: Some("  "),
                color: Some(""),
                ..add(product, 1)
            },
        )
        .await
        .unwrap();
        assert_eq!(cart.view("tok").await.unwrap().lines.len(), 1);
    }

    #[tokio::test]
    async fn test_different_variant_is_new_line() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", 5).await;

        let mut cart = CartService::new(&mut conn);
        cart.add("tok", AddToCart { size: Some("S"), ..add(product, 1) })
            .await
            .unwrap();
        cart.add("tok", AddToCart { size: Some("M"), ..add(product, 1) })
            .await
            .unwrap();
        assert_eq!(cart.view("tok").await.unwrap().lines.len(), 2);
    }

    #[tokio::test]
    async fn test_stock_limits_add_and_merge() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", 3).await;

        let mut cart = CartService::new(&mut conn);
        assert!(matches!(
            cart.add("tok", add(product, 4)).await,
            Err(CartError::InsufficientStock)
        ));
        assert!(cart.view("tok").await.unwrap().is_empty());

        cart.add("tok", add(product, 2)).await.unwrap();
        assert!(matches!(
            cart.add("tok", add(product, 2)).await,
            Err(CartError::InsufficientStock)
        ));
        assert_eq!(cart.view("tok").await.unwrap().unit_count(), 2, "line unchanged");

        cart.add("tok", add(product, 1)).await.unwrap();
        assert_eq!(cart.unit_count("tok").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_add_rejects_bad_input() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", 3).await;

        let mut cart = CartService::new(&mut conn);
        assert!(matches!(
            cart.add("tok", add(product, 0)).await,
            Err(CartError::InvalidQuantity)
        ));
        assert!(matches!(
            cart.add("tok", add(ProductId::new(999), 1)).await,
            Err(CartError::ProductNotFound)
        ));
    }

    #[tokio::test]
    async fn test_remove_checks_owner() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", 3).await;

        let mut cart = CartService::new(&mut conn);
        let line = cart.add("mine", add(product, 1)).await.unwrap();

        assert!(!cart.remove("theirs", line.id).await.unwrap());
        assert_eq!(cart.view("mine").await.unwrap().lines.len(), 1);

        assert!(cart.remove("mine", line.id).await.unwrap());
        assert!(matches!(
            cart.remove("mine", line.id).await,
            Err(CartError::ItemNotFound)
        ));
    }

    #[tokio::test]
    async fn test_ceiling_price_totals_without_panic() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let gown = testing::product(&mut conn, "Gown", "99999999.99", 5).await;

        let mut cart = CartService::new(&mut conn);
        cart.add("tok", add(gown, 2)).await.unwrap();
        let view = cart.view("tok").await.unwrap();
        assert_eq!(view.total, Some(Decimal::new(19_999_999_998, 2)));
    }

    #[tokio::test]
    async fn test_overflowing_total_leaves_total_unset() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let gown = testing::product(&mut conn, "Gown", "99999999.99", i64::MAX).await;

        let sizes: Vec<String> = (0..100).map(|n| format!("S{n}")).collect();
        let mut cart = CartService::new(&mut conn);
        for size in &sizes {
            cart.add(
                "tok",
                AddToCart {
                    size: Some(size.as_str()),
                    ..add(gown, i64::MAX)
                },
            )
            .await
            .unwrap();
        }

        let view = cart.view("tok").await.unwrap();
        assert_eq!(view.lines.len(), 100);
        assert_eq!(view.total, None);
        assert_eq!(view.unit_count(), i64::MAX);
    }

    #[tokio::test]
    async fn test_merge_past_i64_is_insufficient_stock() {
        let pool = testing::pool().await;
        let mut conn = pool.acquire().await.unwrap();
        let product = testing::product(&mut conn, "Tee", "100", i64::MAX).await;

        let mut cart = CartService::new(&mut conn);
        cart.add("tok", add(product, i64::MAX)).await.unwrap();
        assert!(matches!(
            cart.add("tok", add(product, 1)).await,
            Err(CartError::InsufficientStock)
        ));
    }
}
