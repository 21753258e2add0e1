//! User repository.

use chrono::Utc;
use sqlx::SqliteConnection;

use marvo_core::{Email, ReferralCode, UserId, Username};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{NewUser, User};

const USER_COLUMNS: &str = "id, username, email, full_name, phone, address, city, region, \
                            points, referral_code, referred_by, is_active, is_admin, created_at";

/// Repository for user database operations.
pub struct UserRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> UserRepository<'c> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&mut self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(user)
    }

    /// Get a user by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&mut self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(user)
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_username(
        &mut self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(user)
    }

    /// Get the owner of a referral code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_referral_code(
        &mut self,
        code: &ReferralCode,
    ) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE referral_code = ?"
        ))
        .bind(code)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(user)
    }

    /// Whether a referral code is already taken.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn referral_code_exists(&mut self, code: &ReferralCode) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE referral_code = ?)")
                .bind(code)
                .fetch_one(&mut *self.conn)
                .await?;
        Ok(exists)
    }

    /// Insert a new user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the username, email or referral
    /// code is already taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(&mut self, user: &NewUser) -> Result<User, RepositoryError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r"
            INSERT INTO users
                (username, email, password_hash, full_name, phone, address, city, region,
                 referral_code, referred_by, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.city)
        .bind(&user.region)
        .bind(&user.referral_code)
        .bind(user.referred_by)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await
        .map_err(conflict_on_unique("user"))?;

        Ok(created)
    }

    /// Look up an active user and their password hash for login.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_password_hash(
        &mut self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let Some(user) = self.get_by_email(email).await? else {
            return Ok(None);
        };
        if !user.is_active {
            return Ok(None);
        }

        let hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?")
            .bind(user.id)
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(Some((user, hash)))
    }

    /// Grant or revoke admin rights. Returns `false` if no such user exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_admin(&mut self, email: &Email, is_admin: bool) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE users SET is_admin = ? WHERE email = ?")
            .bind(is_admin)
            .bind(email)
            .execute(&mut *self.conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Current admin flag, read fresh from the database.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_admin(&mut self, id: UserId) -> Result<bool, RepositoryError> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT is_admin FROM users WHERE id = ? AND is_active = 1")
                .bind(id)
                .fetch_optional(&mut *self.conn)
                .await?;
        Ok(flag.unwrap_or(false))
    }

    /// Add `delta` to the cached points balance.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn add_points(&mut self, id: UserId, delta: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET points = points + ? WHERE id = ?")
            .bind(delta)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
