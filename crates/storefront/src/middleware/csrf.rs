//! Synchronizer-token CSRF protection.
//!
//! Each session carries one random token. Every rendered form embeds it in a
//! hidden `csrf_token` field and every mutating handler checks it, either
//! through the [`CsrfForm`] extractor or, for multipart bodies, through
//! [`verify_csrf`]. A missing or mismatched token is answered with 403.

use axum::{
    Form,
    extract::{FromRequest, Request, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, de::DeserializeOwned};
use tower_sessions::Session;

use crate::middleware::session::random_token;
use crate::models::session_keys;

/// Form field carrying the token.
pub const CSRF_FIELD: &str = "csrf_token";

/// Forms that carry a CSRF token.
pub trait CsrfProtected {
    fn csrf_token(&self) -> &str;
}

/// A form whose only field is the CSRF token.
#[derive(Debug, Deserialize)]
pub struct CsrfOnly {
    #[serde(default)]
    pub csrf_token: String,
}

impl CsrfProtected for CsrfOnly {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

/// Why a form submission was refused.
#[derive(Debug)]
pub enum CsrfRejection {
    /// The body was not a valid form.
    Form(FormRejection),
    /// No session, or the token did not match.
    InvalidToken,
    /// The session store failed.
    Session(tower_sessions::session::Error),
}

impl IntoResponse for CsrfRejection {
    fn into_response(self) -> Response {
        match self {
            Self::Form(rejection) => rejection.into_response(),
            Self::InvalidToken => {
                (StatusCode::FORBIDDEN, "Invalid or missing CSRF token").into_response()
            }
            Self::Session(e) => crate::error::AppError::from(e).into_response(),
        }
    }
}

/// Return the session's token, creating one on first use.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn csrf_token(session: &Session) -> Result<String, tower_sessions::session::Error> {
    if let Some(token) = session.get::<String>(session_keys::CSRF_TOKEN).await? {
        return Ok(token);
    }
    let token = random_token();
    session.insert(session_keys::CSRF_TOKEN, &token).await?;
    Ok(token)
}

/// Check a submitted token against the session's.
///
/// # Errors
///
/// Returns `CsrfRejection::InvalidToken` if the session has no token or the
/// tokens differ.
pub async fn verify_csrf(session: &Session, submitted: &str) -> Result<(), CsrfRejection> {
    let expected = session
        .get::<String>(session_keys::CSRF_TOKEN)
        .await
        .map_err(CsrfRejection::Session)?;

    match expected {
        Some(expected) if !submitted.is_empty() && constant_time_compare(&expected, submitted) => {
            Ok(())
        }
        _ => {
            tracing::warn!("CSRF token mismatch");
            Err(CsrfRejection::InvalidToken)
        }
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

/// URL-encoded form extractor that refuses submissions without the
/// session's CSRF token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CsrfForm(form): CsrfForm<AddToCartForm>) -> impl IntoResponse {
///     // form.csrf_token already matched the session
/// }
/// ```
pub struct CsrfForm<T>(pub T);

impl<S, T> FromRequest<S> for CsrfForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + CsrfProtected + Send,
{
    type Rejection = CsrfRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let session = req
            .extensions()
            .get::<Session>()
            .cloned()
            .ok_or(CsrfRejection::InvalidToken)?;

        let Form(form) = Form::<T>::from_request(req, state)
            .await
            .map_err(CsrfRejection::Form)?;

        verify_csrf(&session, form.csrf_token()).await?;
        Ok(Self(form))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("hello", "hello"));
        assert!(constant_time_compare("", ""));
        assert!(!constant_time_compare("hello", "world"));
        assert!(!constant_time_compare("hello", "hell"));
    }

    #[test]
    fn test_extractor_future_is_send() {
        fn assert_send<F: Send>(_: &F) {}

        let req = Request::new(axum::body::Body::empty());
        let future = CsrfForm::<CsrfOnly>::from_request(req, &());
        assert_send(&future);
    }

    #[test]
    fn test_invalid_token_is_forbidden() {
        assert_eq!(
            CsrfRejection::InvalidToken.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
