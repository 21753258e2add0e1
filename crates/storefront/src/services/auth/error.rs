//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during registration and login.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] marvo_core::EmailError),

    /// Invalid username format.
    #[error("invalid username: {0}")]
    InvalidUsername(#[from] marvo_core::UsernameError),

    /// Username is already registered.
    #[error("username is already taken")]
    UsernameTaken,

    /// Email is already registered.
    #[error("email is already registered")]
    EmailTaken,

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// Password and confirmation differ.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// Invalid credentials (wrong password, unknown or inactive user).
    #[error("invalid email or password")]
    InvalidCredentials,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// The registration form field this error belongs to, if any.
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidEmail(_) | Self::EmailTaken => Some("email"),
            Self::InvalidUsername(_) | Self::UsernameTaken => Some("username"),
            Self::WeakPassword(_) => Some("password"),
            Self::PasswordMismatch => Some("confirm_password"),
            Self::InvalidCredentials | Self::Repository(_) | Self::PasswordHash => None,
        }
    }

    /// Whether the error is the user's to fix rather than a server fault.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        !matches!(self, Self::Repository(_) | Self::PasswordHash)
    }
}
