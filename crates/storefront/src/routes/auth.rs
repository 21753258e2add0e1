//! Authentication route handlers.
//!
//! Handles registration (with referral codes), password login and logout.

use std::collections::BTreeMap;

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::{Expiry, Session};
use tracing::instrument;

use crate::db;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::session::REMEMBER_ME_SECONDS;
use crate::middleware::{
    CsrfForm, CsrfProtected, Flash, PageContext, RequireAuth, clear_current_user, push_flash,
    set_current_user,
};
use crate::models::CurrentUser;
use crate::routes::flash_redirect;
use crate::services::auth::Registration;
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub csrf_token: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub remember_me: Option<String>,
    pub next: Option<String>,
}

impl CsrfProtected for LoginForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

/// Registration form data.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub csrf_token: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub region: String,
    pub referral_code: String,
}

impl CsrfProtected for RegisterForm {
    fn csrf_token(&self) -> &str {
        &self.csrf_token
    }
}

impl RegisterForm {
    fn registration(&self) -> Registration<'_> {
        Registration {
            username: &self.username,
            email: &self.email,
            password: &self.password,
            confirm_password: &self.confirm_password,
            full_name: Some(self.full_name.as_str()),
            phone: Some(self.phone.as_str()),
            address: Some(self.address.as_str()),
            city: Some(self.city.as_str()),
            region: Some(self.region.as_str()),
            referral_code: Some(self.referral_code.as_str()),
        }
    }
}

// =============================================================================
// Query Types
// =============================================================================

/// `?next=` on the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// `?ref=` on the register page.
#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    #[serde(rename = "ref")]
    pub referral_code: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub email: String,
    pub next: String,
    pub error: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: PageContext,
    /// Previous input; passwords are never echoed back.
    pub form: RegisterForm,
    pub errors: BTreeMap<&'static str, String>,
}

impl RegisterTemplate {
    fn error_for(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Return `next` if it is a same-origin relative path, else `/`.
///
/// Accepts a single leading `/` only: `//host`, backslashes, control
/// characters and anything with a scheme are refused.
#[must_use]
pub fn safe_next(next: Option<&str>) -> &str {
    next.filter(|n| {
        n.starts_with('/')
            && !n.starts_with("//")
            && !n.contains('\\')
            && !n.chars().any(char::is_control)
    })
    .unwrap_or("/")
}

// =============================================================================
// Register Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(page: PageContext, Query(query): Query<RegisterQuery>) -> impl IntoResponse {
    RegisterTemplate {
        page,
        form: RegisterForm {
            referral_code: query.referral_code.unwrap_or_default(),
            ..RegisterForm::default()
        },
        errors: BTreeMap::new(),
    }
}

/// Create an account, redeem a referral code and sign the new user in.
#[instrument(skip(state, session, form), fields(username = %form.username))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    CsrfForm(mut form): CsrfForm<RegisterForm>,
) -> Result<Response> {
    let mut tx = db::begin(state.pool()).await?;
    let result = AuthService::new(&mut tx).register(&form.registration()).await;

    let user = match result {
        Ok(user) => user,
        Err(e) if e.is_user_error() => {
            let mut errors = BTreeMap::new();
            errors.insert(e.field().unwrap_or("form"), e.to_string());
            drop(tx);
            form.password.clear();
            form.confirm_password.clear();
            let page = PageContext::load(&session, &state).await?;
            return Ok(RegisterTemplate { page, form, errors }.into_response());
        }
        Err(e) => return Err(e.into()),
    };
    tx.commit().await?;

    set_current_user(&session, &CurrentUser::from(&user)).await?;
    set_sentry_user(&user.id, user.username.as_str());
    tracing::info!(user_id = %user.id, "User registered");

    Ok(flash_redirect(
        &session,
        Flash::success(format!(
            "Welcome, {}! Share your referral code {} to earn points.",
            user.username, user.referral_code
        )),
        "/",
    )
    .await?
    .into_response())
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(page: PageContext, Query(query): Query<LoginQuery>) -> impl IntoResponse {
    LoginTemplate {
        page,
        email: String::new(),
        next: safe_next(query.next.as_deref()).to_owned(),
        error: None,
    }
}

/// Verify credentials and start an authenticated session.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    CsrfForm(form): CsrfForm<LoginForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref()).to_owned();

    let mut conn = state.pool().acquire().await?;
    let user = match AuthService::new(&mut conn).login(&form.email, &form.password).await {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("Failed login attempt");
            let page = PageContext::load(&session, &state).await?;
            return Ok(LoginTemplate {
                page,
                email: form.email,
                next,
                error: Some(AuthError::InvalidCredentials.to_string()),
            }
            .into_response());
        }
        Err(e) => return Err(e.into()),
    };

    set_current_user(&session, &CurrentUser::from(&user)).await?;
    let expiry = if form.remember_me.is_some() {
        Expiry::OnInactivity(tower_sessions::cookie::time::Duration::seconds(
            REMEMBER_ME_SECONDS,
        ))
    } else {
        Expiry::OnSessionEnd
    };
    session.set_expiry(Some(expiry));

    set_sentry_user(&user.id, user.username.as_str());
    tracing::info!(user_id = %user.id, "User logged in");

    push_flash(&session, Flash::success(format!("Welcome back, {}!", user.username))).await?;
    Ok(Redirect::to(&next).into_response())
}

// =============================================================================
// Logout
// =============================================================================

/// End the authenticated session. The cart stays with the browser.
#[instrument(skip(session, user), fields(user_id = %user.id))]
pub async fn logout(session: Session, RequireAuth(user): RequireAuth) -> Result<Redirect> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    tracing::info!("User logged out");
    flash_redirect(&session, Flash::info("You have been logged out."), "/").await
}
