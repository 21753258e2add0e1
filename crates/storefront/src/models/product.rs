//! Product domain types.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use marvo_core::{Category, Price, ProductId};

/// A catalog product.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    /// Stored filename under the upload directory.
    pub image_url: Option<String>,
    pub category: Category,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Public URL of the product image, if one was uploaded.
    #[must_use]
    pub fn image_src(&self) -> Option<String> {
        self.image_url.as_ref().map(|f| format!("/uploads/{f}"))
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Database row for `products`.
#[derive(Debug, FromRow)]
pub struct ProductRow {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image_url: Option<String>,
    pub category: Category,
    pub size_options: Option<String>,
    pub color_options: Option<String>,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            image_url: row.image_url,
            category: row.category,
            sizes: decode_options(row.size_options.as_deref()),
            colors: decode_options(row.color_options.as_deref()),
            stock: row.stock,
            created_at: row.created_at,
        }
    }
}

/// Decode a stored JSON option list. Missing, null or malformed values yield
/// an empty list.
#[must_use]
pub fn decode_options(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Option<Vec<String>>>(s).ok())
        .flatten()
        .unwrap_or_default()
}

/// Split comma-separated admin input into a trimmed option list.
#[must_use]
pub fn split_options(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Validated input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub image_url: Option<String>,
    pub category: Category,
    pub sizes: Vec<String>,
    pub colors: Vec<String>,
    pub stock: i64,
}

/// Catalog listing filter. Every field is optional; the default matches all
/// products.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub category: Option<Category>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub search: Option<String>,
}

impl ProductFilter {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
