//! Admin account management.
//!
//! Accounts register through the storefront like any customer; this command
//! only flips the admin flag.

use thiserror::Error;

use marvo_core::Email;
use marvo_storefront::db::{RepositoryError, UserRepository};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account uses the email.
    #[error("No account with email: {0}")]
    UnknownAccount(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),
}

/// Set or clear the admin flag for the account with `email`.
///
/// # Errors
///
/// Returns an error if the email is malformed, no account uses it, or the
/// database cannot be reached.
pub async fn set_admin(email: &str, is_admin: bool) -> Result<(), Box<dyn std::error::Error>> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;

    let pool = super::connect().await?;
    let mut conn = pool.acquire().await.map_err(AdminError::from)?;

    let updated = UserRepository::new(&mut conn)
        .set_admin(&email, is_admin)
        .await
        .map_err(AdminError::from)?;
    if !updated {
        return Err(AdminError::UnknownAccount(email.to_string()).into());
    }

    if is_admin {
        tracing::info!(%email, "Admin access granted");
    } else {
        tracing::info!(%email, "Admin access revoked");
    }
    Ok(())
}
