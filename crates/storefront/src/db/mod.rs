//! Database operations for the storefront `SQLite` file.
//!
//! ## Tables
//!
//! - `products` - Catalog
//! - `cart_items` - Anonymous cart lines keyed by cart token
//! - `users` - Accounts, cached points balance, referral codes
//! - `orders` / `order_items` - Placed orders with frozen prices
//! - `reviews`, `comparisons` - Per-user product engagement
//! - `user_points` - Append-only points ledger
//! - `tower_sessions` - Session storage (created by the session store)
//!
//! # Unit of work
//!
//! Repositories borrow a `&mut SqliteConnection`. Handlers open a
//! transaction with [`begin`], hand it to services, and commit once the
//! whole operation succeeded. Dropping the transaction rolls it back.
//!
//! # Migrations
//!
//! Migrations live in `crates/storefront/migrations/` and are embedded in
//! [`MIGRATOR`]. They run on server startup and via:
//! ```bash
//! cargo run -p marvo-cli -- migrate
//! ```

pub mod cart;
pub mod comparisons;
pub mod orders;
pub mod points;
pub mod products;
pub mod reviews;
pub mod users;

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use thiserror::Error;

pub use cart::CartRepository;
pub use comparisons::ComparisonRepository;
pub use orders::OrderRepository;
pub use points::PointsRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use users::UserRepository;

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl From<sqlx::migrate::MigrateError> for RepositoryError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(err.into())
    }
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(what: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(format!("{what} already exists"));
        }
        RepositoryError::Database(e)
    }
}

/// Create a `SQLite` connection pool.
///
/// The database file is created if missing; foreign keys are enforced and
/// the journal runs in WAL mode so readers do not block the writer.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the file cannot be opened.
pub async fn create_pool(database_url: &SecretString) -> Result<SqlitePool, sqlx::Error> {
    let url = database_url.expose_secret();
    ensure_parent_dir(url)?;

    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(8)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

/// Run embedded migrations.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a migration fails.
pub async fn migrate(pool: &SqlitePool) -> Result<(), RepositoryError> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Open a transaction for one unit of work.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if no connection is available.
pub async fn begin(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, RepositoryError> {
    Ok(pool.begin().await?)
}

/// Create the directory holding a file-backed database.
fn ensure_parent_dir(url: &str) -> Result<(), sqlx::Error> {
    let path = url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod testing {
    //! Fixtures for repository and service tests.

    use std::str::FromStr;

    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use sqlx::{SqliteConnection, SqlitePool};

    use marvo_core::{Category, Email, Price, ProductId, ReferralCode, UserId, Username};

    use super::MIGRATOR;
    use crate::models::{NewProduct, NewUser};

    /// A migrated in-memory database on a single connection.
    pub async fn pool() -> SqlitePool {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .expect("in-memory sqlite");
        MIGRATOR.run(&pool).await.expect("migrations apply");
        pool
    }

    pub async fn product(conn: &mut SqliteConnection, name: &str, price: &str, stock: i64) -> ProductId {
        let new = NewProduct {
            name: name.to_owned(),
            description: format!("{name} description"),
            price: Price::parse(price).unwrap(),
            image_url: None,
            category: Category::Shirts,
            sizes: vec!["S".to_owned(), "M".to_owned()],
            colors: vec!["Red".to_owned()],
            stock,
        };
        super::ProductRepository::new(conn)
            .create(&new)
            .await
            .unwrap()
            .id
    }

    pub async fn user(conn: &mut SqliteConnection, username: &str, code: &str) -> UserId {
        let new = NewUser {
            username: Username::parse(username).unwrap(),
            email: Email::parse(&format!("{username}@example.com")).unwrap(),
            password_hash: "not-a-real-hash".to_owned(),
            full_name: None,
            phone: None,
            address: None,
            city: None,
            region: None,
            referral_code: ReferralCode::parse(code).unwrap(),
            referred_by: None,
        };
        super::UserRepository::new(conn)
            .create(&new)
            .await
            .unwrap()
            .id
    }
}
