//! User domain types.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use marvo_core::{Email, ReferralCode, UserId, Username};

/// A shop account. The password hash is never loaded into this type.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: Email,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    /// Cached sum of the points ledger.
    pub points: i64,
    pub referral_code: ReferralCode,
    pub referred_by: Option<UserId>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Shipping address pre-fill for checkout: street, city and region
    /// joined by commas, skipping blanks.
    #[must_use]
    pub fn shipping_address(&self) -> String {
        [&self.address, &self.city, &self.region]
            .into_iter()
            .filter_map(|part| part.as_deref().map(str::trim))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Validated input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: Username,
    pub email: Email,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub referral_code: ReferralCode,
    pub referred_by: Option<UserId>,
}
