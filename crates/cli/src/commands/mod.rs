//! CLI command implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::SqlitePool;

use marvo_storefront::config::DEFAULT_DATABASE_URL;
use marvo_storefront::db;

/// Resolve the database URL the same way the server does.
pub fn database_url() -> SecretString {
    dotenvy::dotenv().ok();

    let url = std::env::var("MARVO_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_owned());
    SecretString::from(url)
}

/// Connect and bring the schema up to date.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or a migration fails.
pub async fn connect() -> Result<SqlitePool, Box<dyn std::error::Error>> {
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&database_url()).await?;
    db::migrate(&pool).await?;
    Ok(pool)
}
