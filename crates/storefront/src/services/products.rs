//! Admin product management.

use std::collections::BTreeMap;

use sqlx::SqliteConnection;
use tracing::instrument;

use marvo_core::{Category, Price, PriceError, ProductId};

use crate::db::{ProductRepository, RepositoryError};
use crate::models::product::split_options;
use crate::models::{NewProduct, Product};
use crate::services::images::{ImageError, ImageStore};

/// Longest product name the catalog accepts.
pub const MAX_NAME_LENGTH: usize = 100;

/// Raw add-product form fields.
#[derive(Debug, Clone, Default)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub price: String,
    pub category: String,
    pub sizes: String,
    pub colors: String,
    pub stock: String,
}

/// Per-field validation messages, keyed by form field name.
pub type FieldErrors = BTreeMap<&'static str, String>;

impl ProductForm {
    /// Validate into a product ready for insertion (without an image).
    ///
    /// # Errors
    ///
    /// Returns every problem found, keyed by field.
    pub fn validate(&self) -> Result<NewProduct, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.insert("name", "Name is required".to_owned());
        } else if name.chars().count() > MAX_NAME_LENGTH {
            errors.insert("name", format!("Name must be at most {MAX_NAME_LENGTH} characters"));
        }

        let description = self.description.trim();
        if description.is_empty() {
            errors.insert("description", "Description is required".to_owned());
        }

        let price = Price::parse(self.price.trim());
        match &price {
            Err(PriceError::TooLarge) => {
                errors.insert("price", "Price must be at most ₱99,999,999.99".to_owned());
            }
            Err(_) => {
                errors.insert("price", "Price must be a number of zero or more".to_owned());
            }
            Ok(_) => {}
        }

        let category = self.category.parse::<Category>();
        if category.is_err() {
            errors.insert("category", "Choose a category".to_owned());
        }

        let stock = self.stock.trim().parse::<i64>();
        match stock {
            Ok(s) if s >= 0 => {}
            _ => {
                errors.insert("stock", "Stock must be a whole number of zero or more".to_owned());
            }
        }

        match (price, category, stock) {
            (Ok(price), Ok(category), Ok(stock)) if errors.is_empty() => Ok(NewProduct {
                name: name.to_owned(),
                description: description.to_owned(),
                price,
                image_url: None,
                category,
                sizes: split_options(&self.sizes),
                colors: split_options(&self.colors),
                stock,
            }),
            _ => Err(errors),
        }
    }
}

/// Admin-side product operations.
pub struct ProductAdminService<'c> {
    conn: &'c mut SqliteConnection,
    images: &'c ImageStore,
}

impl<'c> ProductAdminService<'c> {
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection, images: &'c ImageStore) -> Self {
        Self { conn, images }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&mut self) -> Result<Vec<Product>, RepositoryError> {
        ProductRepository::new(&mut *self.conn)
            .list(&crate::models::ProductFilter::default())
            .await
    }

    /// Insert a validated product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create(&mut self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let created = ProductRepository::new(&mut *self.conn).create(product).await?;
        tracing::info!(product_id = %created.id, "Product created");
        Ok(created)
    }

    /// Delete a product and its stored image.
    ///
    /// A missing image file is ignored; other file errors are logged and do
    /// not undo the delete.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    #[instrument(skip(self))]
    pub async fn delete(&mut self, id: ProductId) -> Result<Product, RepositoryError> {
        let product = ProductRepository::new(&mut *self.conn)
            .delete(id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        if let Some(filename) = &product.image_url {
            match self.images.delete(filename).await {
                Ok(()) => {}
                Err(ImageError::Io(e)) => {
                    tracing::error!(error = %e, filename, "Failed to remove product image");
                }
                Err(e) => tracing::warn!(error = %e, filename, "Unexpected image error"),
            }
        }

        tracing::info!(product_id = %id, "Product deleted");
        Ok(product)
    }
}
