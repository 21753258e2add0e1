//! Human-facing codes: order numbers and referral codes.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a code.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("order number must be 'MRV' followed by 18 digits")]
    MalformedOrderNumber,
    #[error("referral code must be 8 letters or digits")]
    MalformedReferralCode,
}

/// Public identifier of an order, e.g. `MRV202406011230450042`.
///
/// Layout: `MRV` + UTC timestamp `YYYYmmddHHMMSS` + four random digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const PREFIX: &'static str = "MRV";
    const DIGITS: usize = 18;

    /// Build an order number from a timestamp and a random suffix.
    ///
    /// Only the last four decimal digits of `suffix` are used.
    #[must_use]
    pub fn generate(at: DateTime<Utc>, suffix: u16) -> Self {
        Self(format!(
            "{}{}{:04}",
            Self::PREFIX,
            at.format("%Y%m%d%H%M%S"),
            suffix % 10_000
        ))
    }

    /// Parse an order number from a URL segment.
    ///
    /// # Errors
    ///
    /// Returns `CodeError::MalformedOrderNumber` if the prefix or digit count is wrong.
    pub fn parse(s: &str) -> Result<Self, CodeError> {
        let digits = s
            .strip_prefix(Self::PREFIX)
            .ok_or(CodeError::MalformedOrderNumber)?;
        if digits.len() != Self::DIGITS || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodeError::MalformedOrderNumber);
        }
        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user's shareable referral code: eight uppercase letters or digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferralCode(String);

impl ReferralCode {
    pub const LENGTH: usize = 8;
    pub const ALPHABET: &'static [u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    /// Build a code from indices into [`Self::ALPHABET`].
    ///
    /// Indices wrap around the alphabet; exactly [`Self::LENGTH`] are consumed.
    #[must_use]
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        let code = indices
            .into_iter()
            .take(Self::LENGTH)
            .filter_map(|i| Self::ALPHABET.get(i % Self::ALPHABET.len()))
            .map(|b| char::from(*b))
            .collect();
        Self(code)
    }

    /// Parse a code typed by a user. Whitespace is trimmed and letters are
    /// upper-cased.
    ///
    /// # Errors
    ///
    /// Returns `CodeError::MalformedReferralCode` unless the result is exactly
    /// eight ASCII letters or digits.
    pub fn parse(s: &str) -> Result<Self, CodeError> {
        let code = s.trim().to_ascii_uppercase();
        if code.len() != Self::LENGTH || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(CodeError::MalformedReferralCode);
        }
        Ok(Self(code))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferralCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! impl_sqlite_text {
    ($name:ident) => {
        #[cfg(feature = "sqlite")]
        impl sqlx::Type<sqlx::Sqlite> for $name {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <String as sqlx::Type<sqlx::Sqlite>>::type_info()
            }

            fn compatible(ty: &sqlx::sqlite::SqliteTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Sqlite>>::compatible(ty)
            }
        }

        #[cfg(feature = "sqlite")]
        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $name {
            fn decode(
                value: <sqlx::Sqlite as sqlx::Database>::ValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                Ok(Self::parse(&s)?)
            }
        }

        #[cfg(feature = "sqlite")]
        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut <sqlx::Sqlite as sqlx::Database>::ArgumentBuffer<'q>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <String as sqlx::Encode<sqlx::Sqlite>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

impl_sqlite_text!(OrderNumber);
impl_sqlite_text!(ReferralCode);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_order_number_layout() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 45).unwrap();
        let number = OrderNumber::generate(at, 42);
        assert_eq!(number.as_str(), "MRV202406011230450042");
        assert_eq!(OrderNumber::parse(number.as_str()).unwrap(), number);
    }

    #[test]
    fn test_order_number_suffix_wraps() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert!(OrderNumber::generate(at, 12_345).as_str().ends_with("2345"));
    }

    #[test]
    fn test_order_number_rejects_garbage() {
        assert!(OrderNumber::parse("MRV123").is_err());
        assert!(OrderNumber::parse("ABC202406011230450042").is_err());
        assert!(OrderNumber::parse("MRV20240601123045004x").is_err());
    }

    #[test]
    fn test_referral_code_from_indices() {
        let code = ReferralCode::from_indices([0, 1, 2, 25, 26, 35, 36, 71, 99]);
        assert_eq!(code.as_str(), "ABCZ09A9");
        assert_eq!(code.as_str().len(), ReferralCode::LENGTH);
    }

    #[test]
    fn test_referral_code_parse_normalizes() {
        assert_eq!(ReferralCode::parse(" ab12cd34 ").unwrap().as_str(), "AB12CD34");
        assert!(ReferralCode::parse("short").is_err());
        assert!(ReferralCode::parse("ABCD-123").is_err());
    }
}
