//! Gigya credential loading.
//!
//! The API key, app key and domain come from configuration. The app secret is
//! stored encrypted in `gigya.settings` and decrypted with the key read from
//! the key file. Credentials are resolved once per process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::{ConfigError, GigyaConfig};
use crate::crypto::{self, EncryptionError, EncryptionKey};
use crate::db::settings::APP_SECRET_SETTINGS_ID;
use crate::db::{RepositoryError, SecretStore};
use crate::gigya::DiagnosticLog;

/// Stored secrets shorter than this are logged as missing.
const MIN_STORED_SECRET_LENGTH: usize = 5;

/// Errors that can occur while resolving credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// A required setting is missing.
    #[error("missing Gigya setting: {0}")]
    ConfigMissing(String),

    /// The key file exists but could not be read.
    #[error("key file {path} is unreadable: {source}")]
    KeyFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The app secret could not be decrypted.
    #[error("app secret decryption failed: {0}")]
    DecryptionFailed(#[from] EncryptionError),

    /// The settings record could not be read.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<ConfigError> for CredentialError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::MissingEnvVar(var) => Self::ConfigMissing(var),
            other => Self::ConfigMissing(other.to_string()),
        }
    }
}

/// Resolved Gigya API credentials.
pub struct Credentials {
    api_key: String,
    api_secret: SecretString,
    app_key: String,
    api_domain: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("app_key", &self.app_key)
            .field("api_domain", &self.api_domain)
            .finish()
    }
}

impl Credentials {
    /// Create credentials from already decrypted values.
    #[must_use]
    pub fn new(api_key: String, api_secret: SecretString, app_key: String, api_domain: String) -> Self {
        Self {
            api_key,
            api_secret,
            app_key,
            api_domain,
        }
    }

    /// Site API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Decrypted app secret (base64, as issued by Gigya).
    #[must_use]
    pub const fn api_secret(&self) -> &SecretString {
        &self.api_secret
    }

    /// Application (user) key.
    #[must_use]
    pub fn app_key(&self) -> &str {
        &self.app_key
    }

    /// Data center domain.
    #[must_use]
    pub fn api_domain(&self) -> &str {
        &self.api_domain
    }
}

/// Loads and caches [`Credentials`].
pub struct CredentialResolver<S> {
    config: GigyaConfig,
    store: S,
    diagnostics: DiagnosticLog,
    cached: OnceCell<Arc<Credentials>>,
}

impl<S: SecretStore> CredentialResolver<S> {
    /// Create a resolver over the given settings and secret store.
    #[must_use]
    pub fn new(config: GigyaConfig, store: S) -> Self {
        Self {
            diagnostics: DiagnosticLog::new(config.debug_mode),
            config,
            store,
            cached: OnceCell::new(),
        }
    }

    /// Create a resolver reading the Gigya settings from the environment.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::ConfigMissing` if a required variable is
    /// missing or invalid.
    pub fn from_env(store: S) -> Result<Self, CredentialError> {
        Ok(Self::new(GigyaConfig::from_env()?, store))
    }

    /// Resolve the credentials.
    ///
    /// The first successful result is cached; later calls return it without
    /// touching configuration, the database or the key file. Failures are not
    /// cached.
    ///
    /// # Errors
    ///
    /// - `ConfigMissing` if the API key, app key or domain is blank
    /// - `KeyFileUnreadable` if the key file exists but cannot be read
    /// - `DecryptionFailed` if there is no usable key or the secret does not decrypt
    /// - `Repository` if the settings record cannot be read
    pub async fn load(&self) -> Result<Arc<Credentials>, CredentialError> {
        self.cached
            .get_or_try_init(|| self.resolve())
            .await
            .cloned()
    }

    async fn resolve(&self) -> Result<Arc<Credentials>, CredentialError> {
        let api_key = required(&self.config.api_key, "GIGYA_API_KEY")?;
        let app_key = required(&self.config.app_key, "GIGYA_APP_KEY")?;
        let api_domain = required(&self.config.domain, "GIGYA_DOMAIN")?;

        let encrypted = self
            .store
            .encrypted_app_secret(APP_SECRET_SETTINGS_ID)
            .await?
            .unwrap_or_default();
        if encrypted.len() < MIN_STORED_SECRET_LENGTH {
            tracing::warn!(
                settings_id = %APP_SECRET_SETTINGS_ID,
                "No valid secret key found in DB."
            );
        }

        let key = self.read_key_file().await?;
        let api_secret = crypto::decrypt_with(key.as_ref(), &encrypted)?;

        tracing::info!(api_domain, "Gigya credentials loaded");
        Ok(Arc::new(Credentials::new(
            api_key,
            SecretString::from(api_secret),
            app_key,
            api_domain,
        )))
    }

    /// Read the decryption key. An unset path or a missing file yields `None`.
    async fn read_key_file(&self) -> Result<Option<EncryptionKey>, CredentialError> {
        let Some(path) = self.config.key_file_location.as_deref() else {
            self.diagnostics
                .log("load_credentials", "Key file location is not configured");
            tracing::warn!("GIGYA_KEY_FILE_LOCATION is not set; app secret cannot be decrypted");
            return Ok(None);
        };

        if !key_file_exists(path).await {
            self.diagnostics.log(
                "load_credentials",
                format_args!("Key file not found at {}", path.display()),
            );
            tracing::warn!(path = %path.display(), "Gigya key file not found");
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CredentialError::KeyFileUnreadable {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Some(EncryptionKey::from_base64(&contents)?))
    }
}

fn required(value: &str, var: &str) -> Result<String, CredentialError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CredentialError::ConfigMissing(var.to_string()));
    }
    Ok(value.to_string())
}

async fn key_file_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use gigya_im_core::SettingsId;
    use secrecy::ExposeSecret;

    use super::*;

    struct FakeSecretStore {
        secret: Option<String>,
        reads: AtomicUsize,
    }

    impl FakeSecretStore {
        fn new(secret: Option<String>) -> Self {
            Self {
                secret,
                reads: AtomicUsize::new(0),
            }
        }
    }

    impl SecretStore for FakeSecretStore {
        async fn encrypted_app_secret(&self, id: SettingsId) -> Result<Option<String>, RepositoryError> {
            assert_eq!(id, APP_SECRET_SETTINGS_ID);
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self.secret.clone())
        }
    }

    fn config(key_file_location: Option<PathBuf>) -> GigyaConfig {
        GigyaConfig {
            api_key: "3_api_key".to_string(),
            domain: "eu1.gigya.com".to_string(),
            app_key: "app_key".to_string(),
            key_file_location,
            debug_mode: true,
            request_timeout: Duration::from_secs(30),
            platform_name: "Storefront".to_string(),
            platform_version: "1.0.0".to_string(),
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gigya-im-{name}-{}", uuid::Uuid::new_v4()))
    }

    fn write_key_file(key: &EncryptionKey) -> PathBuf {
        let path = temp_path("key");
        std::fs::write(&path, format!("{}\n", key.to_base64())).unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_decrypts_secret() {
        let key = EncryptionKey::generate();
        let path = write_key_file(&key);
        let store = FakeSecretStore::new(Some(crypto::encrypt(&key, "c2VjcmV0").unwrap()));
        let resolver = CredentialResolver::new(config(Some(path.clone())), store);

        let credentials = resolver.load().await.unwrap();
        assert_eq!(credentials.api_key(), "3_api_key");
        assert_eq!(credentials.app_key(), "app_key");
        assert_eq!(credentials.api_domain(), "eu1.gigya.com");
        assert_eq!(credentials.api_secret().expose_secret(), "c2VjcmV0");

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_load_is_cached() {
        let key = EncryptionKey::generate();
        let path = write_key_file(&key);
        let store = FakeSecretStore::new(Some(crypto::encrypt(&key, "c2VjcmV0").unwrap()));
        let resolver = CredentialResolver::new(config(Some(path.clone())), store);

        let first = resolver.load().await.unwrap();
        std::fs::remove_file(&path).unwrap();
        let second = resolver.load().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.store.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let mut config = config(None);
        config.api_key = "  ".to_string();
        let resolver = CredentialResolver::new(config, FakeSecretStore::new(None));

        let err = resolver.load().await.unwrap_err();
        assert!(matches!(err, CredentialError::ConfigMissing(var) if var == "GIGYA_API_KEY"));
    }

    #[tokio::test]
    async fn test_unset_key_file_fails_decryption() {
        let resolver =
            CredentialResolver::new(config(None), FakeSecretStore::new(Some("nonce:cipher".to_string())));

        let err = resolver.load().await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::DecryptionFailed(EncryptionError::MissingKey)
        ));
    }

    #[tokio::test]
    async fn test_missing_key_file_fails_decryption() {
        let resolver = CredentialResolver::new(
            config(Some(temp_path("absent"))),
            FakeSecretStore::new(Some("nonce:cipher".to_string())),
        );

        let err = resolver.load().await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::DecryptionFailed(EncryptionError::MissingKey)
        ));
    }

    #[tokio::test]
    async fn test_unreadable_key_file() {
        // A directory exists but cannot be read as a file
        let dir = temp_path("dir");
        std::fs::create_dir(&dir).unwrap();
        let resolver = CredentialResolver::new(
            config(Some(dir.clone())),
            FakeSecretStore::new(Some("nonce:cipher".to_string())),
        );

        let err = resolver.load().await.unwrap_err();
        assert!(matches!(err, CredentialError::KeyFileUnreadable { .. }));

        std::fs::remove_dir(dir).unwrap();
    }

    #[tokio::test]
    async fn test_short_stored_secret_continues_to_decryption() {
        let key = EncryptionKey::generate();
        let path = write_key_file(&key);
        let resolver = CredentialResolver::new(
            config(Some(path.clone())),
            FakeSecretStore::new(Some("abc".to_string())),
        );

        let err = resolver.load().await.unwrap_err();
        assert!(matches!(
            err,
            CredentialError::DecryptionFailed(EncryptionError::InvalidCiphertextFormat)
        ));
        assert_eq!(resolver.store.reads.load(Ordering::SeqCst), 1);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_debug_redacts_secret() {
        let credentials = Credentials::new(
            "api".to_string(),
            SecretString::from("top-secret"),
            "app".to_string(),
            "us1.gigya.com".to_string(),
        );
        let debug = format!("{credentials:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("top-secret"));
    }
}
