//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring a signed-in shopper or an admin in
//! route handlers.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::{CurrentUser, Identity, session_keys};
use crate::state::AppState;

/// Extractor that requires an authenticated user.
///
/// If the user is not logged in, redirects to `/login?next=<path>`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.username)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when authentication or authorization fails.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to the login page, remembering where to come back to.
    RedirectToLogin { next: String },
    /// Signed in but not an admin.
    Forbidden,
    /// The session layer is missing or the session store failed.
    Internal(AppError),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { next } => {
                Redirect::to(&format!("/login?next={}", urlencoding::encode(&next))).into_response()
            }
            Self::Forbidden => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
            Self::Internal(err) => err.into_response(),
        }
    }
}

fn session_from(parts: &Parts) -> Result<&Session, AuthRejection> {
    parts
        .extensions
        .get::<Session>()
        .ok_or_else(|| AuthRejection::Internal(AppError::Internal("session layer missing".to_owned())))
}

fn login_redirect(parts: &Parts) -> AuthRejection {
    let next = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string);
    AuthRejection::RedirectToLogin { next }
}

/// Read the signed-in user from the session.
///
/// # Errors
///
/// Returns an error if the session store cannot be read.
pub async fn current_user(session: &Session) -> Result<Option<CurrentUser>, tower_sessions::session::Error> {
    session.get::<CurrentUser>(session_keys::CURRENT_USER).await
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;
        let user = current_user(session)
            .await
            .map_err(|e| AuthRejection::Internal(e.into()))?;

        user.map(Self).ok_or_else(|| login_redirect(parts))
    }
}

/// Extractor that requires a signed-in user holding the admin flag.
///
/// The flag is re-read from the database on every request, so revoking
/// admin rights takes effect without waiting for the session to expire.
/// Anonymous visitors are redirected to login; other users get 403.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        let mut conn = state
            .pool()
            .acquire()
            .await
            .map_err(|e| AuthRejection::Internal(e.into()))?;
        let is_admin = UserRepository::new(&mut conn)
            .is_admin(user.id)
            .await
            .map_err(|e| AuthRejection::Internal(e.into()))?;

        if is_admin {
            Ok(Self(user))
        } else {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin denied");
            Err(AuthRejection::Forbidden)
        }
    }
}

/// Extractor for who is making the request; never rejects an anonymous
/// visitor.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentIdentity(identity): CurrentIdentity) -> impl IntoResponse {
///     match identity.user() {
///         Some(u) => format!("Hello, {}!", u.username),
///         None => "Hello, guest!".to_string(),
///     }
/// }
/// ```
pub struct CurrentIdentity(pub Identity);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => current_user(session).await.ok().flatten(),
            None => None,
        };

        Ok(Self(Identity::from(user)))
    }
}

/// Store the signed-in user in the session.
///
/// Cycles the session id first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Helper to clear the current user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_redirect_keeps_path_and_query() {
        let (parts, ()) = axum::http::Request::builder()
            .uri("/order_tracking/MRV1?x=1")
            .body(())
            .unwrap()
            .into_parts();

        let response = login_redirect(&parts).into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").and_then(|v| v.to_str().ok()),
            Some("/login?next=%2Forder_tracking%2FMRV1%3Fx%3D1")
        );
    }

    #[test]
    fn test_forbidden_status() {
        assert_eq!(
            AuthRejection::Forbidden.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
