//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::gigya::{DiagnosticLog, GigyaClient};
use crate::services::{AccountMapper, CustomerEvents};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    gigya: GigyaClient,
    mapper: AccountMapper,
    events: CustomerEvents,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool
    /// * `gigya` - Gigya client built from the resolved credentials
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool, gigya: GigyaClient) -> Self {
        let mapper = AccountMapper::from_config(&config.gigya);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                gigya,
                mapper,
                events: CustomerEvents::with_defaults(),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Gigya client.
    #[must_use]
    pub fn gigya(&self) -> &GigyaClient {
        &self.inner.gigya
    }

    /// Get a reference to the account mapper.
    #[must_use]
    pub fn mapper(&self) -> &AccountMapper {
        &self.inner.mapper
    }

    /// Get a reference to the customer event registry.
    #[must_use]
    pub fn events(&self) -> &CustomerEvents {
        &self.inner.events
    }

    /// Gigya diagnostic log, enabled by `GIGYA_DEBUG_MODE`.
    #[must_use]
    pub fn diagnostics(&self) -> DiagnosticLog {
        DiagnosticLog::new(self.inner.config.gigya.debug_mode)
    }
}
