//! Database operations for storefront `PostgreSQL`.
//!
//! # Tables
//!
//! - `storefront.customer` - Local customer records (Gigya owns identity)
//! - `storefront.customer_address` - Customer shipping/billing addresses
//! - `gigya.settings` - Encrypted Gigya app secret (record id 1)
//! - `tower_sessions.session` - Tower-sessions storage
//!
//! # Saving customers
//!
//! All customer writes go through [`save_customer`], which opens the local
//! transaction and calls the [`SaveHooks`] at the points where the Gigya sync
//! gate must run. A hook error rolls the transaction back.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p gigya-im-cli -- migrate
//! ```

pub mod customers;
pub mod settings;

pub use customers::{PgCustomerStore, PgCustomerTransaction};
pub use settings::PgSettingsStore;

use std::future::Future;
use std::time::Duration;

use gigya_im_core::{AddressId, CustomerAddress, CustomerId, Email, LocalCustomerRecord, SettingsId};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::services::sync::SyncError;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Errors from [`save_customer`].
#[derive(Debug, Error)]
pub enum SaveError {
    /// A save hook refused the transaction (Gigya sync failed).
    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),

    /// The local write failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

// =============================================================================
// Persistence traits
// =============================================================================

/// Read access to customers plus the ability to open a write transaction.
pub trait CustomerStore: Send + Sync {
    /// Transaction type returned by [`CustomerStore::begin`].
    type Transaction: CustomerTransaction;

    /// Open a local transaction.
    fn begin(&self) -> impl Future<Output = Result<Self::Transaction, RepositoryError>> + Send;

    /// Load a customer with its addresses.
    fn find_by_id(
        &self,
        id: CustomerId,
    ) -> impl Future<Output = Result<Option<LocalCustomerRecord>, RepositoryError>> + Send;

    /// Load the customer linked to a Gigya UID.
    fn find_by_gigya_uid(
        &self,
        uid: &str,
    ) -> impl Future<Output = Result<Option<LocalCustomerRecord>, RepositoryError>> + Send;

    /// Load a customer by email.
    fn find_by_email(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Option<LocalCustomerRecord>, RepositoryError>> + Send;
}

/// An open local transaction.
///
/// Dropping a transaction without committing rolls it back.
pub trait CustomerTransaction: Send {
    /// Open a nested transaction (savepoint).
    fn begin_nested(&mut self) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Release the innermost nested transaction.
    fn release_nested(&mut self) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert or update the customer row. Returns its ID.
    fn write_customer(
        &mut self,
        record: &LocalCustomerRecord,
    ) -> impl Future<Output = Result<CustomerId, RepositoryError>> + Send;

    /// Replace the customer's addresses. Returns the IDs in input order.
    fn write_addresses(
        &mut self,
        customer_id: CustomerId,
        addresses: &[CustomerAddress],
    ) -> impl Future<Output = Result<Vec<AddressId>, RepositoryError>> + Send;

    /// Commit the transaction.
    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Roll the transaction back.
    fn rollback(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Access to the encrypted Gigya app secret.
pub trait SecretStore: Send + Sync {
    /// The encrypted app secret stored in settings record `id`, if any.
    fn encrypted_app_secret(
        &self,
        id: SettingsId,
    ) -> impl Future<Output = Result<Option<String>, RepositoryError>> + Send;
}

/// Hooks called by [`save_customer`] around the local transaction.
pub trait SaveHooks: Send {
    /// Called before the transaction is opened.
    fn before_save(&mut self, record: &LocalCustomerRecord);

    /// Called right after every transaction open, including nested ones.
    ///
    /// Returning an error rolls the whole save back.
    fn after_begin_transaction(
        &mut self,
        record: &mut LocalCustomerRecord,
    ) -> impl Future<Output = Result<(), SyncError>> + Send;
}

// =============================================================================
// Save orchestration
// =============================================================================

/// Save a customer and its addresses in one local transaction.
///
/// Order: `before_save`, begin, `after_begin_transaction`, customer row,
/// then (when there are addresses) a savepoint with another
/// `after_begin_transaction` around the address rows, commit.
///
/// On any failure the transaction is rolled back and the in-memory sync flag
/// is restored to its value before the save. On success `record.id` and the
/// address IDs are filled in.
///
/// # Errors
///
/// Returns `SaveError::Sync` if a hook fails and `SaveError::Repository` if
/// a local write or the commit fails.
pub async fn save_customer<S, H>(
    store: &S,
    hooks: &mut H,
    record: &mut LocalCustomerRecord,
) -> Result<CustomerId, SaveError>
where
    S: CustomerStore,
    H: SaveHooks,
{
    hooks.before_save(record);
    let was_synchronized = record.is_synchronized_to_gigya;

    let mut tx = store.begin().await?;

    if let Err(e) = hooks.after_begin_transaction(record).await {
        record.is_synchronized_to_gigya = was_synchronized;
        rollback_quietly(tx).await;
        return Err(e.into());
    }
    let pushed = record.is_synchronized_to_gigya && !was_synchronized;

    let written = match write_customer_rows(&mut tx, hooks, record).await {
        Ok(written) => written,
        Err(e) => {
            record.is_synchronized_to_gigya = was_synchronized;
            rollback_quietly(tx).await;
            warn_if_diverged(pushed, record, &e);
            return Err(e);
        }
    };

    if let Err(e) = tx.commit().await {
        record.is_synchronized_to_gigya = was_synchronized;
        let e = SaveError::from(e);
        warn_if_diverged(pushed, record, &e);
        return Err(e);
    }

    let (customer_id, address_ids) = written;
    record.id = Some(customer_id);
    for (address, id) in record.addresses.iter_mut().zip(address_ids) {
        address.id = Some(id);
    }

    tracing::debug!(customer_id = %customer_id, pushed, "Customer saved");
    Ok(customer_id)
}

async fn write_customer_rows<T, H>(
    tx: &mut T,
    hooks: &mut H,
    record: &mut LocalCustomerRecord,
) -> Result<(CustomerId, Vec<AddressId>), SaveError>
where
    T: CustomerTransaction,
    H: SaveHooks,
{
    let customer_id = tx.write_customer(record).await?;
    if record.addresses.is_empty() {
        return Ok((customer_id, Vec::new()));
    }

    tx.begin_nested().await?;
    hooks.after_begin_transaction(record).await?;
    let address_ids = tx.write_addresses(customer_id, &record.addresses).await?;
    tx.release_nested().await?;

    Ok((customer_id, address_ids))
}

async fn rollback_quietly<T: CustomerTransaction>(tx: T) {
    if let Err(e) = tx.rollback().await {
        tracing::error!(error = %e, "Failed to roll back customer transaction");
    }
}

/// Gigya already has data the local database never committed.
fn warn_if_diverged(pushed: bool, record: &LocalCustomerRecord, error: &SaveError) {
    if pushed {
        tracing::warn!(
            email = %record.email,
            gigya_uid = record.gigya_uid.as_deref().unwrap_or_default(),
            error = %error,
            "Local save rolled back after Gigya accepted the update; Gigya and the local record now differ"
        );
    }
}
