//! Gigya credential check.
//!
//! # Usage
//!
//! ```bash
//! gim-cli credentials check
//! ```
//!
//! Resolves the credentials exactly as the storefront does at startup and
//! reports the outcome. Secrets are never printed.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use gigya_im_storefront::config::{ConfigError, database_url_from_env};
use gigya_im_storefront::db::PgSettingsStore;
use gigya_im_storefront::services::{CredentialError, CredentialResolver};

/// Errors that can occur while checking credentials.
#[derive(Debug, Error)]
pub enum CheckError {
    /// Database URL is not configured.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The credentials could not be resolved.
    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialError),
}

/// Resolve the Gigya credentials and log a summary.
///
/// # Errors
///
/// Returns `CheckError` if the database is unreachable or the credentials
/// cannot be resolved.
pub async fn check() -> Result<(), CheckError> {
    let database_url = database_url_from_env()?;
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    let resolver = CredentialResolver::from_env(PgSettingsStore::new(&pool))?;
    let credentials = resolver.load().await?;

    tracing::info!(
        api_key = credentials.api_key(),
        app_key = credentials.app_key(),
        domain = credentials.api_domain(),
        secret_len = credentials.api_secret().expose_secret().len(),
        "Gigya credentials resolved"
    );
    Ok(())
}
