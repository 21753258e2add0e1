//! Database migration command.
//!
//! Migrations are embedded from `crates/storefront/migrations/`; the server
//! also applies them on startup.

/// Apply pending migrations.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or a migration fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;
    pool.close().await;
    tracing::info!("Migrations complete!");
    Ok(())
}
