//! Per-request data every rendered page needs: who is signed in, pending
//! flash notices, the CSRF token for forms and the cart badge count.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use crate::error::AppError;
use crate::middleware::auth::current_user;
use crate::middleware::csrf::csrf_token;
use crate::middleware::flash::{Flash, take_flashes};
use crate::middleware::session::cart_token;
use crate::models::{CurrentUser, Identity};
use crate::services::CartService;
use crate::state::AppState;

/// Shared context for the base layout.
#[derive(Debug, Clone)]
pub struct PageContext {
    pub identity: Identity,
    pub flashes: Vec<Flash>,
    pub csrf_token: String,
    pub cart_count: i64,
}

impl PageContext {
    #[must_use]
    pub const fn user(&self) -> Option<&CurrentUser> {
        self.identity.user()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(|u| u.is_admin)
    }

    /// Build the context from an already-extracted session.
    ///
    /// Takes the pending flash notices out of the session, so call it only
    /// when a page is actually rendered.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store or database cannot be read.
    pub async fn load(session: &Session, state: &AppState) -> Result<Self, AppError> {
        let identity = Identity::from(current_user(session).await?);
        let flashes = take_flashes(session).await?;
        let csrf_token = csrf_token(session).await?;

        let cart_count = match cart_token(session).await? {
            Some(token) => {
                let mut conn = state.pool().acquire().await?;
                CartService::new(&mut conn).unit_count(&token).await?
            }
            None => 0,
        };

        Ok(Self {
            identity,
            flashes,
            csrf_token,
            cart_count,
        })
    }
}

impl FromRequestParts<AppState> for PageContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))?;

        Self::load(&session, state).await
    }
}
