//! Gigya settings repository.

use sqlx::PgPool;

use gigya_im_core::SettingsId;

use super::{RepositoryError, SecretStore};

/// Settings record holding the app secret.
pub const APP_SECRET_SETTINGS_ID: SettingsId = SettingsId::new(1);

/// `PostgreSQL` store for `gigya.settings`.
pub struct PgSettingsStore<'a> {
    pool: &'a PgPool,
}

impl<'a> PgSettingsStore<'a> {
    /// Create a new settings store.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Store (or replace) the encrypted app secret of settings record `id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn store_encrypted_app_secret(
        &self,
        id: SettingsId,
        encrypted: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO gigya.settings (id, app_secret)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE
            SET app_secret = EXCLUDED.app_secret, updated_at = NOW()
            ",
        )
        .bind(id.as_i32())
        .bind(encrypted)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}

impl SecretStore for PgSettingsStore<'_> {
    async fn encrypted_app_secret(&self, id: SettingsId) -> Result<Option<String>, RepositoryError> {
        let secret = sqlx::query_scalar::<_, Option<String>>(
            "SELECT app_secret FROM gigya.settings WHERE id = $1",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(secret.flatten())
    }
}
