//! Gigya app secret commands.
//!
//! # Usage
//!
//! ```bash
//! # Write a new encryption key file
//! gim-cli secret generate-key --output /etc/gigya/key
//!
//! # Encrypt the app secret (read from stdin) and store it in gigya.settings
//! gim-cli secret encrypt
//!
//! # Only print the encrypted value
//! gim-cli secret encrypt --print
//! ```
//!
//! # Environment Variables
//!
//! - `GIGYA_KEY_FILE_LOCATION` / `GIGYA_KEY_FILE_ROOT` - key file location
//! - `STOREFRONT_DATABASE_URL` (or `DATABASE_URL`) - where the secret is stored

use std::io::BufRead;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use gigya_im_storefront::config::{ConfigError, GigyaConfig, database_url_from_env};
use gigya_im_storefront::crypto::{self, EncryptionError, EncryptionKey};
use gigya_im_storefront::db::settings::APP_SECRET_SETTINGS_ID;
use gigya_im_storefront::db::{PgSettingsStore, RepositoryError};

/// Errors that can occur during secret operations.
#[derive(Debug, Error)]
pub enum SecretError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No key file location was given or configured.
    #[error("No key file location: pass --output or set GIGYA_KEY_FILE_LOCATION")]
    MissingKeyFileLocation,

    /// The key file already exists.
    #[error("Key file already exists: {0} (use --force to overwrite)")]
    KeyFileExists(PathBuf),

    /// Reading or writing a file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No secret was provided.
    #[error("The app secret is empty")]
    EmptySecret,

    /// Encryption failed or the key is invalid.
    #[error("Encryption error: {0}")]
    Encryption(#[from] EncryptionError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Storing the secret failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Write a freshly generated key to `output`, or to the configured key file.
///
/// # Errors
///
/// Returns `SecretError` if no location is known, the file exists and
/// `force` is not set, or the file cannot be written.
pub async fn generate_key(output: Option<PathBuf>, force: bool) -> Result<(), SecretError> {
    let path = match output {
        Some(path) => path,
        None => GigyaConfig::from_env()?
            .key_file_location
            .ok_or(SecretError::MissingKeyFileLocation)?,
    };

    write_key_file(&path, &EncryptionKey::generate(), force).await?;
    tracing::info!(path = %path.display(), "Key file written");
    Ok(())
}

/// Encrypt the app secret with the configured key file.
///
/// The secret is taken from `value` or read from the first line of stdin.
/// With `print_only` the encrypted value is printed instead of stored.
///
/// # Errors
///
/// Returns `SecretError` if the key file is missing or invalid, the secret is
/// empty, or the settings record cannot be written.
pub async fn encrypt(value: Option<String>, print_only: bool) -> Result<(), SecretError> {
    let config = GigyaConfig::from_env()?;
    let path = config
        .key_file_location
        .ok_or(SecretError::MissingKeyFileLocation)?;
    let key = read_key_file(&path).await?;

    let secret = match value {
        Some(value) => value,
        None => read_secret_line(std::io::stdin().lock())?,
    };
    let encrypted = encrypt_secret(&key, &secret)?;

    if print_only {
        #[allow(clippy::print_stdout)]
        {
            println!("{encrypted}");
        }
        return Ok(());
    }

    let database_url = database_url_from_env()?;
    let pool = PgPool::connect(database_url.expose_secret()).await?;
    PgSettingsStore::new(&pool)
        .store_encrypted_app_secret(APP_SECRET_SETTINGS_ID, &encrypted)
        .await?;

    tracing::info!(settings_id = %APP_SECRET_SETTINGS_ID, "App secret stored");
    Ok(())
}

/// Encrypt a trimmed, non-empty secret.
fn encrypt_secret(key: &EncryptionKey, secret: &str) -> Result<String, SecretError> {
    let secret = secret.trim();
    if secret.is_empty() {
        return Err(SecretError::EmptySecret);
    }
    Ok(crypto::encrypt(key, secret)?)
}

fn read_secret_line(mut input: impl BufRead) -> Result<String, SecretError> {
    let mut line = String::new();
    input.read_line(&mut line).map_err(|source| SecretError::Io {
        path: PathBuf::from("<stdin>"),
        source,
    })?;
    Ok(line)
}

async fn read_key_file(path: &Path) -> Result<EncryptionKey, SecretError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SecretError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(EncryptionKey::from_base64(&contents)?)
}

async fn write_key_file(path: &Path, key: &EncryptionKey, force: bool) -> Result<(), SecretError> {
    let exists = tokio::fs::try_exists(path)
        .await
        .map_err(|source| SecretError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if exists && !force {
        return Err(SecretError::KeyFileExists(path.to_path_buf()));
    }

    tokio::fs::write(path, format!("{}\n", key.to_base64()))
        .await
        .map_err(|source| SecretError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("gim-cli-key-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_written_key_file_decrypts_encrypted_secret() {
        let path = temp_path();
        let key = EncryptionKey::generate();
        write_key_file(&path, &key, false).await.unwrap();

        let loaded = read_key_file(&path).await.unwrap();
        let encrypted = encrypt_secret(&loaded, "  app-secret\n").unwrap();
        assert_eq!(crypto::decrypt(&key, &encrypted).unwrap(), "app-secret");

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_key_file_refuses_overwrite_without_force() {
        let path = temp_path();
        write_key_file(&path, &EncryptionKey::generate(), false)
            .await
            .unwrap();

        let err = write_key_file(&path, &EncryptionKey::generate(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, SecretError::KeyFileExists(_)));

        write_key_file(&path, &EncryptionKey::generate(), true)
            .await
            .unwrap();
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_key_file_missing() {
        let err = read_key_file(&temp_path()).await.unwrap_err();
        assert!(matches!(err, SecretError::Io { .. }));
    }

    #[test]
    fn test_blank_secret_is_rejected() {
        let key = EncryptionKey::generate();
        assert!(matches!(
            encrypt_secret(&key, " \n"),
            Err(SecretError::EmptySecret)
        ));
    }

    #[test]
    fn test_read_secret_line_reads_first_line() {
        let line = read_secret_line("first\nsecond\n".as_bytes()).unwrap();
        assert_eq!(line, "first\n");
    }
}
