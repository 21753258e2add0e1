//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required in production
//! - `MARVO_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `MARVO_ENV` - `development` (default) or `production`
//! - `MARVO_DATABASE_URL` - `SQLite` URL, falls back to `DATABASE_URL`
//!   (default: `sqlite://instance/marvo_store.db?mode=rwc`)
//! - `MARVO_HOST` - Bind address (default: 127.0.0.1)
//! - `MARVO_PORT` - Listen port (default: 5000)
//! - `MARVO_BASE_URL` - Public URL (default: `http://<host>:<port>`)
//! - `MARVO_DEBUG` - Verbose logging when `true` or `1`
//! - `MARVO_UPLOAD_DIR` - Product image directory (default: `static/uploads`)
//! - `MARVO_STATIC_DIR` - Stylesheets and other assets
//!   (default: `crates/storefront/static`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sampling rates

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Signing secret used when none is configured outside production.
pub const DEV_SESSION_SECRET: &str = "dev-key-change-in-production";

/// Database used when neither `MARVO_DATABASE_URL` nor `DATABASE_URL` is set.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://instance/marvo_store.db?mode=rwc";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "change-in-production",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("expected development or production, got '{other}'")),
        }
    }
}

/// Storefront application configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StorefrontConfig {
    pub environment: Environment,
    /// `SQLite` connection URL
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// True when the development fallback secret is in use
    pub using_dev_secret: bool,
    /// Verbose logging default
    pub debug: bool,
    /// Directory holding uploaded product images
    pub upload_dir: PathBuf,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

impl fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("environment", &self.environment)
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("session_secret", &"[REDACTED]")
            .field("using_dev_secret", &self.using_dev_secret)
            .field("debug", &self.debug)
            .field("upload_dir", &self.upload_dir)
            .field("static_dir", &self.static_dir)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if variables are invalid, or if secrets fail
    /// validation in production (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let environment = env.parse_or("MARVO_ENV", Environment::Development)?;
        let database_url = SecretString::from(
            env.get("MARVO_DATABASE_URL")
                .or_else(|| env.get("DATABASE_URL"))
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned()),
        );
        let host = env.parse_or("MARVO_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = env.parse_or("MARVO_PORT", 5000_u16)?;
        let base_url = env
            .get("MARVO_BASE_URL")
            .unwrap_or_else(|| format!("http://{host}:{port}"));

        let (session_secret, using_dev_secret) = match env.get("MARVO_SESSION_SECRET") {
            Some(secret) => {
                let secret = SecretString::from(secret);
                if environment.is_production() {
                    validate_session_secret(&secret, "MARVO_SESSION_SECRET")?;
                    validate_secret_strength(secret.expose_secret(), "MARVO_SESSION_SECRET")?;
                }
                (secret, false)
            }
            None if environment.is_production() => {
                return Err(ConfigError::MissingEnvVar("MARVO_SESSION_SECRET".to_owned()));
            }
            None => (SecretString::from(DEV_SESSION_SECRET), true),
        };

        let debug = env.flag("MARVO_DEBUG")?;
        let upload_dir = PathBuf::from(
            env.get("MARVO_UPLOAD_DIR")
                .unwrap_or_else(|| "static/uploads".to_owned()),
        );
        let static_dir = PathBuf::from(
            env.get("MARVO_STATIC_DIR")
                .unwrap_or_else(|| "crates/storefront/static".to_owned()),
        );

        Ok(Self {
            environment,
            database_url,
            host,
            port,
            base_url,
            session_secret,
            using_dev_secret,
            debug,
            upload_dir,
            static_dir,
            sentry_dsn: env.get("SENTRY_DSN"),
            sentry_environment: env.get("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env.parse_or("SENTRY_SAMPLE_RATE", 1.0_f32)?,
            sentry_traces_sample_rate: env.parse_or("SENTRY_TRACES_SAMPLE_RATE", 0.1_f32)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies must only travel over HTTPS.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production() || self.base_url.starts_with("https://")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Non-empty value of `key`.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.get(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))
        })
    }

    fn flag(&self, key: &str) -> Result<bool, ConfigError> {
        match self.get(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            None | Some("0" | "false" | "no" | "off") => Ok(false),
            Some("1" | "true" | "yes" | "on") => Ok(true),
            Some(other) => Err(ConfigError::InvalidEnvVar(
                key.to_owned(),
                format!("expected a boolean, got '{other}'"),
            )),
        }
    }
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const STRONG_SECRET: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6%";

    fn config_from(pairs: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        StorefrontConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.port, 5000);
        assert_eq!(config.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.database_url.expose_secret(), DEFAULT_DATABASE_URL);
        assert_eq!(config.upload_dir, PathBuf::from("static/uploads"));
        assert!(config.using_dev_secret);
        assert!(!config.debug);
        assert!(!config.secure_cookies());
    }

    #[test]
    fn test_database_url_fallback() {
        let config = config_from(&[("DATABASE_URL", "sqlite://other.db")]).unwrap();
        assert_eq!(config.database_url.expose_secret(), "sqlite://other.db");

        let config = config_from(&[
            ("DATABASE_URL", "sqlite://other.db"),
            ("MARVO_DATABASE_URL", "sqlite://mine.db"),
        ])
        .unwrap();
        assert_eq!(config.database_url.expose_secret(), "sqlite://mine.db");
    }

    #[test]
    fn test_production_requires_secret() {
        let err = config_from(&[("MARVO_ENV", "production")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(_)));

        let err = config_from(&[
            ("MARVO_ENV", "production"),
            ("MARVO_SESSION_SECRET", "too-short"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));

        let config = config_from(&[
            ("MARVO_ENV", "production"),
            ("MARVO_SESSION_SECRET", STRONG_SECRET),
        ])
        .unwrap();
        assert!(config.secure_cookies());
        assert!(!config.using_dev_secret);
    }

    #[test]
    fn test_production_rejects_dev_secret() {
        let err = config_from(&[
            ("MARVO_ENV", "production"),
            ("MARVO_SESSION_SECRET", "dev-key-change-in-production-0123456789"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config_from(&[("MARVO_PORT", "eighty")]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(matches!(
            config_from(&[("MARVO_ENV", "staging")]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(matches!(
            config_from(&[("MARVO_DEBUG", "maybe")]),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
    }

    #[test]
    fn test_debug_flag_and_https_base_url() {
        let config = config_from(&[
            ("MARVO_DEBUG", "TRUE"),
            ("MARVO_BASE_URL", "https://shop.example.ph"),
        ])
        .unwrap();
        assert!(config.debug);
        assert!(config.secure_cookies());
    }

    #[test]
    fn test_debug_output_redacts_secrets() {
        let config = config_from(&[("SENTRY_DSN", "https://key@sentry.example/1")]).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains(DEV_SESSION_SECRET));
        assert!(!debug.contains("key@sentry"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(validate_secret_strength("your-api-key-here", "TEST_VAR").is_err());
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
        assert!(validate_secret_strength(STRONG_SECRET, "TEST_VAR").is_ok());
    }
}
