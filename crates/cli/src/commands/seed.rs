//! Seed the catalog from a YAML file.
//!
//! Products are only inserted into an empty catalog, so running the command
//! twice never duplicates them.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use marvo_core::{Category, Price};
use marvo_storefront::db::{self, ProductRepository};
use marvo_storefront::models::NewProduct;

/// Catalog used when no file is given.
const STARTER_CATALOG: &str = include_str!("../../seed/catalog.yaml");

/// Top-level seed file layout.
#[derive(Debug, Deserialize)]
pub struct CatalogFile {
    pub products: Vec<SeedProduct>,
}

/// One product entry. Prices are strings so they stay exact.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    pub description: String,
    pub price: String,
    pub category: Category,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    pub stock: i64,
}

impl SeedProduct {
    fn to_new_product(&self) -> Result<NewProduct, String> {
        if self.name.trim().is_empty() {
            return Err("name is empty".to_owned());
        }
        if self.stock < 0 {
            return Err(format!("{}: stock is negative", self.name));
        }
        let price = Price::parse(&self.price).map_err(|e| format!("{}: {e}", self.name))?;

        Ok(NewProduct {
            name: self.name.trim().to_owned(),
            description: self.description.trim().to_owned(),
            price,
            image_url: None,
            category: self.category,
            sizes: self.sizes.clone(),
            colors: self.colors.clone(),
            stock: self.stock,
        })
    }
}

/// Parse and validate a catalog file body.
///
/// # Errors
///
/// Returns every invalid entry, or the YAML error if the file does not parse.
pub fn parse_catalog(content: &str) -> Result<Vec<NewProduct>, Vec<String>> {
    let file: CatalogFile = serde_yaml::from_str(content).map_err(|e| vec![e.to_string()])?;

    let mut products = Vec::with_capacity(file.products.len());
    let mut errors = Vec::new();
    for entry in &file.products {
        match entry.to_new_product() {
            Ok(product) => products.push(product),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() { Ok(products) } else { Err(errors) }
}

/// Seed products from `file_path`, or the starter catalog, into an empty
/// catalog.
///
/// Returns the number of products inserted.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is invalid, or if the
/// database cannot be reached.
pub async fn catalog(file_path: Option<&str>) -> Result<usize, Box<dyn std::error::Error>> {
    let content = match file_path {
        Some(file_path) => {
            let path = Path::new(file_path);
            if !path.exists() {
                return Err(format!("File not found: {file_path}").into());
            }
            info!(path = %file_path, "Loading catalog from file");
            tokio::fs::read_to_string(path).await?
        }
        None => {
            info!("Loading starter catalog");
            STARTER_CATALOG.to_owned()
        }
    };

    let products = match parse_catalog(&content) {
        Ok(products) => products,
        Err(errors) => {
            error!("Catalog validation failed:");
            for err in &errors {
                error!("  - {err}");
            }
            return Err(format!("{} validation errors found", errors.len()).into());
        }
    };
    info!(products = products.len(), "Parsed catalog");

    let pool = super::connect().await?;
    let mut tx = db::begin(&pool).await?;

    let existing = ProductRepository::new(&mut tx).count().await?;
    if existing > 0 {
        info!(existing, "Catalog already has products, skipping seed");
        return Ok(0);
    }

    for product in &products {
        ProductRepository::new(&mut tx).create(product).await?;
    }
    tx.commit().await?;

    info!("Seeding complete! Products inserted: {}", products.len());
    Ok(products.len())
}
