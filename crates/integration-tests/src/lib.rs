//! Integration tests for Gigya IM.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p gigya-im-integration-tests
//! ```
//!
//! The tests drive the real save orchestration, sync gate and profile flows
//! against two in-process collaborators:
//!
//! - [`MemoryCustomerStore`] - a transactional customer store. Writes go to a
//!   working copy that replaces the committed tables on commit; savepoints
//!   snapshot the working copy. Failures can be injected per operation.
//! - [`RecordingIdentityService`] - an identity service that records every
//!   call and can be told to reject updates, password changes or signatures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gigya_im_core::{AddressId, CustomerAddress, CustomerId, Email, LocalCustomerRecord, RemoteAccount};
use gigya_im_storefront::db::{CustomerStore, CustomerTransaction, RepositoryError};
use gigya_im_storefront::gigya::{GigyaError, IdentityService};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(operation: &str) -> RepositoryError {
    RepositoryError::Database(sqlx::Error::Protocol(format!("injected {operation} failure")))
}

// =============================================================================
// Customer store
// =============================================================================

/// Transaction lifecycle events, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxEvent {
    Begin,
    Savepoint,
    Release,
    Commit,
    Rollback,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    customers: HashMap<i32, LocalCustomerRecord>,
    next_customer_id: i32,
    next_address_id: i32,
}

impl Tables {
    fn conflict(&self, record: &LocalCustomerRecord) -> Option<String> {
        let own_id = record.id.map(|id| id.as_i32());
        self.customers
            .iter()
            .filter(|(id, _)| Some(**id) != own_id)
            .find_map(|(_, other)| {
                if other.email.matches(record.email.as_str()) {
                    Some(format!("email {} already exists", record.email))
                } else if record.gigya_uid.is_some() && other.gigya_uid == record.gigya_uid {
                    Some("gigya_uid already linked".to_string())
                } else {
                    None
                }
            })
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Failures {
    customer_write: bool,
    address_write: bool,
    commit: bool,
}

/// In-memory transactional customer store.
#[derive(Debug, Clone, Default)]
pub struct MemoryCustomerStore {
    committed: Arc<Mutex<Tables>>,
    failures: Arc<Mutex<Failures>>,
    events: Arc<Mutex<Vec<TxEvent>>>,
}

impl MemoryCustomerStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a customer directly into the committed tables, bypassing
    /// transactions and hooks. Returns the stored record with IDs filled in.
    #[must_use]
    pub fn seed(&self, mut record: LocalCustomerRecord) -> LocalCustomerRecord {
        let mut tables = lock(&self.committed);
        let id = match record.id {
            Some(id) => id,
            None => {
                tables.next_customer_id += 1;
                CustomerId::new(tables.next_customer_id)
            }
        };
        tables.next_customer_id = tables.next_customer_id.max(id.as_i32());
        record.id = Some(id);
        for address in &mut record.addresses {
            tables.next_address_id += 1;
            address.id = Some(AddressId::new(tables.next_address_id));
        }
        tables.customers.insert(id.as_i32(), record.clone());
        record
    }

    /// The committed state of a customer.
    #[must_use]
    pub fn committed(&self, id: CustomerId) -> Option<LocalCustomerRecord> {
        lock(&self.committed).customers.get(&id.as_i32()).cloned()
    }

    /// Number of committed customers.
    #[must_use]
    pub fn customer_count(&self) -> usize {
        lock(&self.committed).customers.len()
    }

    /// Transaction events recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<TxEvent> {
        lock(&self.events).clone()
    }

    /// Make customer row writes fail.
    pub fn fail_customer_writes(&self, fail: bool) {
        lock(&self.failures).customer_write = fail;
    }

    /// Make address writes fail.
    pub fn fail_address_writes(&self, fail: bool) {
        lock(&self.failures).address_write = fail;
    }

    /// Make commits fail.
    pub fn fail_commits(&self, fail: bool) {
        lock(&self.failures).commit = fail;
    }

    fn find(&self, predicate: impl Fn(&LocalCustomerRecord) -> bool) -> Option<LocalCustomerRecord> {
        lock(&self.committed)
            .customers
            .values()
            .find(|c| predicate(c))
            .cloned()
    }
}

impl CustomerStore for MemoryCustomerStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, RepositoryError> {
        lock(&self.events).push(TxEvent::Begin);
        Ok(MemoryTransaction {
            committed: Arc::clone(&self.committed),
            events: Arc::clone(&self.events),
            failures: *lock(&self.failures),
            working: lock(&self.committed).clone(),
            savepoints: Vec::new(),
        })
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<LocalCustomerRecord>, RepositoryError> {
        Ok(self.committed(id))
    }

    async fn find_by_gigya_uid(&self, uid: &str) -> Result<Option<LocalCustomerRecord>, RepositoryError> {
        Ok(self.find(|c| c.gigya_uid.as_deref() == Some(uid)))
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<LocalCustomerRecord>, RepositoryError> {
        Ok(self.find(|c| c.email.matches(email.as_str())))
    }
}

/// Open transaction on a [`MemoryCustomerStore`].
///
/// Dropping it without [`CustomerTransaction::commit`] discards the working
/// copy.
#[derive(Debug)]
pub struct MemoryTransaction {
    committed: Arc<Mutex<Tables>>,
    events: Arc<Mutex<Vec<TxEvent>>>,
    failures: Failures,
    working: Tables,
    savepoints: Vec<Tables>,
}

impl CustomerTransaction for MemoryTransaction {
    async fn begin_nested(&mut self) -> Result<(), RepositoryError> {
        lock(&self.events).push(TxEvent::Savepoint);
        self.savepoints.push(self.working.clone());
        Ok(())
    }

    async fn release_nested(&mut self) -> Result<(), RepositoryError> {
        lock(&self.events).push(TxEvent::Release);
        self.savepoints
            .pop()
            .map(|_| ())
            .ok_or_else(|| injected("release"))
    }

    async fn write_customer(&mut self, record: &LocalCustomerRecord) -> Result<CustomerId, RepositoryError> {
        if self.failures.customer_write {
            return Err(injected("customer write"));
        }
        if let Some(conflict) = self.working.conflict(record) {
            return Err(RepositoryError::Conflict(conflict));
        }

        let mut row = record.clone();
        let id = match record.id {
            Some(id) => {
                let existing = self
                    .working
                    .customers
                    .get(&id.as_i32())
                    .ok_or(RepositoryError::NotFound)?;
                row.addresses.clone_from(&existing.addresses);
                if row.password_hash.is_none() {
                    row.password_hash.clone_from(&existing.password_hash);
                }
                id
            }
            None => {
                self.working.next_customer_id += 1;
                row.addresses.clear();
                CustomerId::new(self.working.next_customer_id)
            }
        };
        row.id = Some(id);
        self.working.customers.insert(id.as_i32(), row);
        Ok(id)
    }

    async fn write_addresses(
        &mut self,
        customer_id: CustomerId,
        addresses: &[CustomerAddress],
    ) -> Result<Vec<AddressId>, RepositoryError> {
        if self.failures.address_write {
            return Err(injected("address write"));
        }

        let mut stored = Vec::with_capacity(addresses.len());
        let mut ids = Vec::with_capacity(addresses.len());
        for address in addresses {
            self.working.next_address_id += 1;
            let id = AddressId::new(self.working.next_address_id);
            let mut address = address.clone();
            address.id = Some(id);
            stored.push(address);
            ids.push(id);
        }

        let customer = self
            .working
            .customers
            .get_mut(&customer_id.as_i32())
            .ok_or(RepositoryError::NotFound)?;
        customer.addresses = stored;
        Ok(ids)
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        if self.failures.commit {
            lock(&self.events).push(TxEvent::Rollback);
            return Err(injected("commit"));
        }
        *lock(&self.committed) = self.working;
        lock(&self.events).push(TxEvent::Commit);
        Ok(())
    }

    async fn rollback(self) -> Result<(), RepositoryError> {
        lock(&self.events).push(TxEvent::Rollback);
        Ok(())
    }
}

// =============================================================================
// Identity service
// =============================================================================

/// A recorded `change_password` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChangeCall {
    pub login_id: String,
    pub current_password: String,
    pub new_password: String,
}

/// Identity service that records calls and fails on demand.
#[derive(Debug)]
pub struct RecordingIdentityService {
    accounts: Mutex<HashMap<String, RemoteAccount>>,
    updates: Mutex<Vec<RemoteAccount>>,
    password_changes: Mutex<Vec<PasswordChangeCall>>,
    signature_contexts: Mutex<Vec<String>>,
    update_error: Mutex<Option<i64>>,
    password_error: Mutex<Option<i64>>,
    accept_signatures: AtomicBool,
}

impl Default for RecordingIdentityService {
    fn default() -> Self {
        Self {
            accounts: Mutex::default(),
            updates: Mutex::default(),
            password_changes: Mutex::default(),
            signature_contexts: Mutex::default(),
            update_error: Mutex::default(),
            password_error: Mutex::default(),
            accept_signatures: AtomicBool::new(true),
        }
    }
}

impl RecordingIdentityService {
    /// Create a service that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `account` available to `get_account`.
    pub fn add_account(&self, account: RemoteAccount) {
        lock(&self.accounts).insert(account.uid.clone(), account);
    }

    /// Fail every `update_account` with the given Gigya error code.
    pub fn fail_updates_with(&self, code: Option<i64>) {
        *lock(&self.update_error) = code;
    }

    /// Fail every `change_password` with the given Gigya error code.
    pub fn fail_password_changes_with(&self, code: Option<i64>) {
        *lock(&self.password_error) = code;
    }

    /// Accept or reject signed tokens.
    pub fn accept_signatures(&self, accept: bool) {
        self.accept_signatures.store(accept, Ordering::SeqCst);
    }

    /// Accounts pushed through `update_account`, in order.
    #[must_use]
    pub fn updates(&self) -> Vec<RemoteAccount> {
        lock(&self.updates).clone()
    }

    /// Recorded password changes, in order.
    #[must_use]
    pub fn password_changes(&self) -> Vec<PasswordChangeCall> {
        lock(&self.password_changes).clone()
    }

    /// Contexts passed to `validate_signed_token`, in order.
    #[must_use]
    pub fn signature_contexts(&self) -> Vec<String> {
        lock(&self.signature_contexts).clone()
    }
}

/// A Gigya API error with the given code.
#[must_use]
pub fn api_error(code: i64) -> GigyaError {
    GigyaError::Api {
        code,
        message: match code {
            403_042 => "Invalid LoginID".to_string(),
            _ => "General Server Error".to_string(),
        },
        details: None,
        call_id: Some(format!("call-{code}")),
    }
}

impl IdentityService for RecordingIdentityService {
    fn validate_signed_token(&self, _uid: &str, _signature: &str, _timestamp: &str, context: &str) -> bool {
        lock(&self.signature_contexts).push(context.to_string());
        self.accept_signatures.load(Ordering::SeqCst)
    }

    async fn get_account(&self, uid: &str) -> Result<RemoteAccount, GigyaError> {
        lock(&self.accounts)
            .get(uid)
            .cloned()
            .ok_or_else(|| api_error(403_005))
    }

    async fn update_account(&self, account: &RemoteAccount) -> Result<(), GigyaError> {
        if let Some(code) = *lock(&self.update_error) {
            return Err(api_error(code));
        }
        lock(&self.updates).push(account.clone());
        Ok(())
    }

    async fn change_password(
        &self,
        login_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), GigyaError> {
        lock(&self.password_changes).push(PasswordChangeCall {
            login_id: login_id.to_string(),
            current_password: current_password.to_string(),
            new_password: new_password.to_string(),
        });
        match *lock(&self.password_error) {
            Some(code) => Err(api_error(code)),
            None => Ok(()),
        }
    }
}
