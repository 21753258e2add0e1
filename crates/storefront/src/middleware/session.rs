//! Session middleware configuration.
//!
//! Sets up `SQLite`-backed, signed sessions using tower-sessions.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use sqlx::SqlitePool;
use tower_sessions::cookie::Key;
use tower_sessions::{Expiry, Session, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::StorefrontConfig;
use crate::models::session_keys;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "marvo_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Expiry applied when a shopper ticks "remember me" (30 days).
pub const REMEMBER_ME_SECONDS: i64 = 30 * 24 * 60 * 60;

/// Create the `SQLite` session store and its table.
///
/// # Errors
///
/// Returns `sqlx::Error` if the session table cannot be created.
pub async fn create_session_store(pool: &SqlitePool) -> Result<SqliteStore, sqlx::Error> {
    let store = SqliteStore::new(pool.clone());
    store.migrate().await?;
    Ok(store)
}

/// Create the session layer over `store`.
///
/// Cookies are signed with a key derived from the configured session secret
/// and marked `Secure` in production or when served over HTTPS.
#[must_use]
pub fn create_session_layer(
    store: SqliteStore,
    config: &StorefrontConfig,
) -> SessionManagerLayer<SqliteStore, tower_sessions::service::SignedCookie> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.secure_cookies())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(config.session_secret.expose_secret()))
}

/// Derive the 64-byte cookie signing key from the session secret.
fn signing_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

/// Random bytes behind cart and CSRF tokens.
const TOKEN_BYTES: usize = 24;

/// A fresh URL-safe random token.
pub(crate) fn random_token() -> String {
    let mut bytes = [0_u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// The session's cart token, if a cart was ever started.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn cart_token(session: &Session) -> Result<Option<String>, tower_sessions::session::Error> {
    session.get::<String>(session_keys::CART_TOKEN).await
}

/// The session's cart token, created on first cart interaction.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn ensure_cart_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = cart_token(session).await? {
        return Ok(token);
    }
    let token = random_token();
    session.insert(session_keys::CART_TOKEN, &token).await?;
    Ok(token)
}
