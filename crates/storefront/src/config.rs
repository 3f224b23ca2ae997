//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `STOREFRONT_SESSION_SECRET` - Session signing secret (min 32 chars, high entropy)
//! - `GIGYA_API_KEY` - Gigya site API key
//! - `GIGYA_APP_KEY` - Gigya application (user) key
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `GIGYA_DOMAIN` - Gigya data center domain (default: us1.gigya.com)
//! - `GIGYA_KEY_FILE_LOCATION` - Path of the file holding the app secret decryption key
//! - `GIGYA_KEY_FILE_ROOT` - Directory a relative key file location is resolved against
//! - `GIGYA_DEBUG_MODE` - Emit Gigya diagnostic logs (`1`/`true`/`yes`/`on`)
//! - `GIGYA_REQUEST_TIMEOUT_SECS` - Gigya HTTP request timeout (default: 30)
//! - `COMMERCE_PLATFORM_NAME` - Platform name reported to Gigya (default: Storefront)
//! - `COMMERCE_PLATFORM_VERSION` - Platform version reported to Gigya (default: crate version)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_GIGYA_DOMAIN: &str = "us1.gigya.com";
const DEFAULT_GIGYA_TIMEOUT_SECS: u64 = 30;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Session signing secret
    pub session_secret: SecretString,
    /// Gigya provider settings
    pub gigya: GigyaConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Gigya provider settings.
///
/// The app secret is not part of this struct: it is stored encrypted in the
/// database and decrypted by [`crate::services::credentials::CredentialResolver`].
#[derive(Debug, Clone)]
pub struct GigyaConfig {
    /// Site API key
    pub api_key: String,
    /// Data center domain (e.g., us1.gigya.com)
    pub domain: String,
    /// Application (user) key used for server-to-server calls
    pub app_key: String,
    /// Location of the decryption key file, already resolved against its root
    pub key_file_location: Option<PathBuf>,
    /// Whether Gigya diagnostic logs are emitted
    pub debug_mode: bool,
    /// HTTP timeout for Gigya requests
    pub request_timeout: Duration,
    /// Commerce platform name sent as diagnostic context
    pub platform_name: String,
    /// Commerce platform version sent as diagnostic context
    pub platform_version: String,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the session secret fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = database_url_from_env()?;
        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;
        let session_secret = get_validated_secret("STOREFRONT_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "STOREFRONT_SESSION_SECRET")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            gigya: GigyaConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl GigyaConfig {
    /// Load the Gigya section only.
    ///
    /// Used directly by the CLI, which has no use for the HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a numeric
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let timeout_secs = get_env_or_default(
            "GIGYA_REQUEST_TIMEOUT_SECS",
            &DEFAULT_GIGYA_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("GIGYA_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        Ok(Self {
            api_key: get_required_env("GIGYA_API_KEY")?,
            domain: get_env_or_default("GIGYA_DOMAIN", DEFAULT_GIGYA_DOMAIN),
            app_key: get_required_env("GIGYA_APP_KEY")?,
            key_file_location: resolve_key_file_location(
                get_optional_env("GIGYA_KEY_FILE_ROOT").as_deref(),
                get_optional_env("GIGYA_KEY_FILE_LOCATION").as_deref(),
            ),
            debug_mode: parse_flag(get_optional_env("GIGYA_DEBUG_MODE").as_deref()),
            request_timeout: Duration::from_secs(timeout_secs),
            platform_name: get_env_or_default("COMMERCE_PLATFORM_NAME", "Storefront"),
            platform_version: get_env_or_default(
                "COMMERCE_PLATFORM_VERSION",
                env!("CARGO_PKG_VERSION"),
            ),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get the database URL with fallback to generic `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn database_url_from_env() -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var("STOREFRONT_DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(
        "STOREFRONT_DATABASE_URL".to_string(),
    ))
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Interpret a boolean-ish flag value.
fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Resolve the key file location against its root directory.
///
/// An absolute location is used as is; a relative one is joined onto the
/// root when a root is configured.
fn resolve_key_file_location(root: Option<&str>, location: Option<&str>) -> Option<PathBuf> {
    let location = PathBuf::from(location?);
    if location.is_absolute() {
        return Some(location);
    }
    Some(match root {
        Some(root) => PathBuf::from(root).join(location),
        None => location,
    })
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
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
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

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
