//! Session-related types.
//!
//! Types stored in the session for authentication and cart state.

use serde::{Deserialize, Serialize};

use marvo_core::{Email, UserId, Username};

use super::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Login handle shown in the navigation.
    pub username: Username,
    /// User's email address.
    pub email: Email,
    /// Whether the admin panel link is shown. Admin routes re-check the
    /// database, so a stale value never grants access.
    pub is_admin: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated(CurrentUser),
}

impl Identity {
    #[must_use]
    pub const fn user(&self) -> Option<&CurrentUser> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }

    #[must_use]
    pub fn into_user(self) -> Option<CurrentUser> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(user) => Some(user),
        }
    }
}

impl From<Option<CurrentUser>> for Identity {
    fn from(user: Option<CurrentUser>) -> Self {
        user.map_or(Self::Anonymous, Self::Authenticated)
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the anonymous cart token.
    pub const CART_TOKEN: &str = "cart_token";

    /// Key for the per-session CSRF token.
    pub const CSRF_TOKEN: &str = "csrf_token";

    /// Key for pending flash notices.
    pub const FLASHES: &str = "flashes";
}
