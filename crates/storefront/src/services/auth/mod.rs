//! Authentication service.
//!
//! Password registration and login, plus referral code issuance and
//! redemption at sign-up.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;
use sqlx::SqliteConnection;
use tracing::instrument;

use marvo_core::{Email, PointsReason, ReferralCode, Username};

use crate::db::RepositoryError;
use crate::db::users::UserRepository;
use crate::models::{NewUser, User};
use crate::services::points::{REFERRAL_BONUS, award_points};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Attempts at drawing an unused referral code before giving up.
const REFERRAL_CODE_ATTEMPTS: usize = 16;

/// Raw registration form input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Registration<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub confirm_password: &'a str,
    pub full_name: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub address: Option<&'a str>,
    pub city: Option<&'a str>,
    pub region: Option<&'a str>,
    /// Someone else's referral code, if the visitor typed one.
    pub referral_code: Option<&'a str>,
}

/// Authentication service.
///
/// Borrows the caller's connection or transaction; registration performs
/// several writes and should run inside a transaction.
pub struct AuthService<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> AuthService<'c> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Register a new user.
    ///
    /// A referral code that matches an existing user links the new account
    /// to them and credits them [`REFERRAL_BONUS`] points. Unknown or
    /// malformed codes are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUsername` / `AuthError::InvalidEmail` for malformed fields.
    /// Returns `AuthError::WeakPassword` if the password is too short.
    /// Returns `AuthError::PasswordMismatch` if the confirmation differs.
    /// Returns `AuthError::UsernameTaken` / `AuthError::EmailTaken` if already registered.
    #[instrument(skip(self, form), fields(username = %form.username))]
    pub async fn register(&mut self, form: &Registration<'_>) -> Result<User, AuthError> {
        let username = Username::parse(form.username)?;
        let email = Email::parse(form.email)?;
        validate_password(form.password)?;
        if form.password != form.confirm_password {
            return Err(AuthError::PasswordMismatch);
        }

        let mut users = UserRepository::new(&mut *self.conn);
        if users.get_by_username(&username).await?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if users.get_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let referrer = match form.referral_code.map(ReferralCode::parse) {
            Some(Ok(code)) => users.get_by_referral_code(&code).await?,
            Some(Err(_)) | None => None,
        };
        let referral_code = self.unused_referral_code().await?;
        let password_hash = hash_password(form.password)?;

        let new_user = NewUser {
            username,
            email,
            password_hash,
            full_name: non_blank(form.full_name),
            phone: non_blank(form.phone),
            address: non_blank(form.address),
            city: non_blank(form.city),
            region: non_blank(form.region),
            referral_code,
            referred_by: referrer.as_ref().map(|r| r.id),
        };

        let user = UserRepository::new(&mut *self.conn)
            .create(&new_user)
            .await?;

        if let Some(referrer) = referrer {
            award_points(
                &mut *self.conn,
                referrer.id,
                REFERRAL_BONUS,
                PointsReason::Referral,
                None,
            )
            .await?;
            tracing::info!(referrer_id = %referrer.id, "Referral redeemed");
        }

        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Login with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or
    /// malformed, the account is inactive, or the password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = Email::parse(email).map_err(|_| AuthError::InvalidCredentials)?;

        let (user, password_hash) = UserRepository::new(&mut *self.conn)
            .get_password_hash(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        Ok(user)
    }

    async fn unused_referral_code(&mut self) -> Result<ReferralCode, AuthError> {
        let mut users = UserRepository::new(&mut *self.conn);
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let code = generate_referral_code();
            if !users.referral_code_exists(&code).await? {
                return Ok(code);
            }
        }
        Err(AuthError::Repository(RepositoryError::Conflict(
            "no unused referral code found".to_owned(),
        )))
    }
}

/// Draw a random referral code.
#[must_use]
pub fn generate_referral_code() -> ReferralCode {
    let mut rng = rand::rng();
    ReferralCode::from_indices(
        (0..ReferralCode::LENGTH).map(|_| rng.random_range(0..ReferralCode::ALPHABET.len())),
    )
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
