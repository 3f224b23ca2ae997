//! Gigya sync gate.
//!
//! A customer save must be accepted by Gigya before the local transaction
//! commits. The gate is created per save and used in two phases:
//!
//! 1. [`SyncGate::stage`] captures the customer about to be saved.
//! 2. [`SyncGate::try_commit_sync`] runs right after the local transaction
//!    opens. It takes the staged customer out of the slot, pushes it to Gigya
//!    when needed, and flags the record as synchronized on success.
//!
//! The slot is emptied by the first commit attempt whatever its result, so a
//! nested or repeated transaction open during the same save never pushes
//! twice. [`crate::db::save_customer`] drives both phases through
//! [`SaveHooks`].

use gigya_im_core::{CustomerId, Email, LocalCustomerRecord};
use thiserror::Error;

use super::mapping::{AccountMapper, MappingError};
use crate::db::SaveHooks;
use crate::gigya::{GigyaError, IdentityService};

/// Errors that abort the local transaction.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The record being saved is not the one that was staged.
    #[error("staged customer does not match the record being saved")]
    UnexpectedRecord,

    /// The record could not be mapped to a Gigya account.
    #[error("mapping failed: {0}")]
    Mapping(#[from] MappingError),

    /// Gigya rejected the update or could not be reached.
    #[error("Gigya update failed: {0}")]
    Remote(#[from] GigyaError),
}

/// Why a staged record was not pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Deleted,
    AlreadySynchronized,
}

/// Result of a commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Gigya accepted the update and the record is flagged synchronized.
    Synchronized,
    /// A record was staged but needs no push.
    Skipped(SkipReason),
    /// The slot was empty; nothing was done.
    NothingStaged,
}

/// Whether `record` must be pushed to Gigya.
#[must_use]
pub fn shall_sync(record: Option<&LocalCustomerRecord>) -> bool {
    record.is_some_and(|r| skip_reason(r).is_none())
}

fn skip_reason(record: &LocalCustomerRecord) -> Option<SkipReason> {
    if record.is_deleted {
        Some(SkipReason::Deleted)
    } else if record.is_synchronized_to_gigya {
        Some(SkipReason::AlreadySynchronized)
    } else {
        None
    }
}

/// Identity of the staged customer.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StagedCustomer {
    id: Option<CustomerId>,
    email: Email,
}

impl StagedCustomer {
    fn of(record: &LocalCustomerRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
        }
    }
}

/// Per-save gate between the local transaction and Gigya.
pub struct SyncGate<'a, I> {
    identity: &'a I,
    mapper: &'a AccountMapper,
    staged: Option<StagedCustomer>,
}

impl<'a, I: IdentityService> SyncGate<'a, I> {
    /// Create an empty gate.
    #[must_use]
    pub const fn new(identity: &'a I, mapper: &'a AccountMapper) -> Self {
        Self {
            identity,
            mapper,
            staged: None,
        }
    }

    /// Capture `record` as the candidate for the next commit attempt.
    pub fn stage(&mut self, record: &LocalCustomerRecord) {
        self.staged = Some(StagedCustomer::of(record));
    }

    /// Whether a record is waiting in the slot.
    #[must_use]
    pub const fn is_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// Consume the slot and push `record` to Gigya if it needs it.
    ///
    /// On success the record's `is_synchronized_to_gigya` flag is set; the
    /// caller's transaction is still open at that point.
    ///
    /// # Errors
    ///
    /// - `UnexpectedRecord` if `record` is not the staged customer
    /// - `Mapping` if the record has no Gigya UID
    /// - `Remote` if Gigya rejects the update
    ///
    /// The flag is left untouched on every error.
    pub async fn try_commit_sync(
        &mut self,
        record: &mut LocalCustomerRecord,
    ) -> Result<SyncOutcome, SyncError> {
        let Some(staged) = self.staged.take() else {
            return Ok(SyncOutcome::NothingStaged);
        };
        if staged != StagedCustomer::of(record) {
            return Err(SyncError::UnexpectedRecord);
        }

        if let Some(reason) = skip_reason(record) {
            tracing::debug!(email = %record.email, ?reason, "Gigya sync skipped");
            return Ok(SyncOutcome::Skipped(reason));
        }

        let account = self.mapper.enrich(record)?;
        if let Err(e) = self.identity.update_account(&account).await {
            tracing::error!(
                email = %record.email,
                uid = %account.uid,
                error = %e,
                "Gigya rejected customer update; aborting local save"
            );
            return Err(e.into());
        }

        record.is_synchronized_to_gigya = true;
        tracing::info!(email = %record.email, uid = %account.uid, "Customer synchronized to Gigya");
        Ok(SyncOutcome::Synchronized)
    }
}

impl<I: IdentityService> SaveHooks for SyncGate<'_, I> {
    fn before_save(&mut self, record: &LocalCustomerRecord) {
        self.stage(record);
    }

    async fn after_begin_transaction(
        &mut self,
        record: &mut LocalCustomerRecord,
    ) -> Result<(), SyncError> {
        self.try_commit_sync(record).await.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use gigya_im_core::RemoteAccount;

    use super::*;

    #[derive(Default)]
    struct FakeIdentity {
        updates: Mutex<Vec<RemoteAccount>>,
        fail: bool,
    }

    impl FakeIdentity {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn update_count(&self) -> usize {
            self.updates.lock().unwrap().len()
        }
    }

    impl IdentityService for FakeIdentity {
        fn validate_signed_token(&self, _: &str, _: &str, _: &str, _: &str) -> bool {
            true
        }

        async fn get_account(&self, uid: &str) -> Result<RemoteAccount, GigyaError> {
            Ok(RemoteAccount {
                uid: uid.to_string(),
                ..RemoteAccount::default()
            })
        }

        async fn update_account(&self, account: &RemoteAccount) -> Result<(), GigyaError> {
            self.updates.lock().unwrap().push(account.clone());
            if self.fail {
                return Err(GigyaError::Api {
                    code: 500_001,
                    message: "General Server Error".to_string(),
                    details: None,
                    call_id: None,
                });
            }
            Ok(())
        }

        async fn change_password(&self, _: &str, _: &str, _: &str) -> Result<(), GigyaError> {
            Ok(())
        }
    }

    fn mapper() -> AccountMapper {
        AccountMapper::new("cms_version:Storefront_1.0.0,gigya_version:Gigya_module_0.1.0".to_string())
    }

    fn record() -> LocalCustomerRecord {
        let mut record = LocalCustomerRecord::new(Email::parse("a@b.com").unwrap());
        record.id = Some(CustomerId::new(42));
        record.gigya_uid = Some("uid-42".to_string());
        record.first_name = Some("A".to_string());
        record.last_name = Some("B".to_string());
        record
    }

    #[test]
    fn test_shall_sync() {
        let mut r = record();
        assert!(shall_sync(Some(&r)));
        assert!(!shall_sync(None));

        r.is_synchronized_to_gigya = true;
        assert!(!shall_sync(Some(&r)));

        r.is_synchronized_to_gigya = false;
        r.is_deleted = true;
        assert!(!shall_sync(Some(&r)));
    }

    #[tokio::test]
    async fn test_push_then_slot_cleared() {
        let identity = FakeIdentity::default();
        let mapper = mapper();
        let mut gate = SyncGate::new(&identity, &mapper);
        let mut record = record();

        gate.stage(&record);
        assert!(gate.is_staged());

        let outcome = gate.try_commit_sync(&mut record).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Synchronized);
        assert!(record.is_synchronized_to_gigya);
        assert!(!gate.is_staged());

        let pushed = identity.updates.lock().unwrap()[0].clone();
        assert_eq!(pushed.login_id(), Some("a@b.com"));
        assert_eq!(pushed.profile.first_name(), Some("A"));
        assert_eq!(pushed.profile.last_name(), Some("B"));

        let outcome = gate.try_commit_sync(&mut record).await.unwrap();
        assert_eq!(outcome, SyncOutcome::NothingStaged);
        assert_eq!(identity.update_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_push_leaves_flag_and_clears_slot() {
        let identity = FakeIdentity::failing();
        let mapper = mapper();
        let mut gate = SyncGate::new(&identity, &mapper);
        let mut record = record();

        gate.stage(&record);
        let err = gate.try_commit_sync(&mut record).await.unwrap_err();
        assert!(matches!(err, SyncError::Remote(_)));
        assert!(!record.is_synchronized_to_gigya);
        assert!(!gate.is_staged());

        assert_eq!(
            gate.try_commit_sync(&mut record).await.unwrap(),
            SyncOutcome::NothingStaged
        );
        assert_eq!(identity.update_count(), 1);
    }

    #[tokio::test]
    async fn test_already_synchronized_is_skipped() {
        let identity = FakeIdentity::default();
        let mapper = mapper();
        let mut gate = SyncGate::new(&identity, &mapper);
        let mut record = record();
        record.is_synchronized_to_gigya = true;

        gate.stage(&record);
        assert_eq!(
            gate.try_commit_sync(&mut record).await.unwrap(),
            SyncOutcome::Skipped(SkipReason::AlreadySynchronized)
        );
        assert_eq!(identity.update_count(), 0);
    }

    #[tokio::test]
    async fn test_deleted_is_skipped() {
        let identity = FakeIdentity::default();
        let mapper = mapper();
        let mut gate = SyncGate::new(&identity, &mapper);
        let mut record = record();
        record.is_deleted = true;

        gate.stage(&record);
        assert_eq!(
            gate.try_commit_sync(&mut record).await.unwrap(),
            SyncOutcome::Skipped(SkipReason::Deleted)
        );
        assert!(!record.is_synchronized_to_gigya);
        assert_eq!(identity.update_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_uid_aborts_without_push() {
        let identity = FakeIdentity::default();
        let mapper = mapper();
        let mut gate = SyncGate::new(&identity, &mapper);
        let mut record = record();
        record.gigya_uid = None;

        gate.stage(&record);
        let err = gate.try_commit_sync(&mut record).await.unwrap_err();
        assert!(matches!(err, SyncError::Mapping(MappingError::MissingUid)));
        assert_eq!(identity.update_count(), 0);
    }

    #[tokio::test]
    async fn test_other_record_is_rejected() {
        let identity = FakeIdentity::default();
        let mapper = mapper();
        let mut gate = SyncGate::new(&identity, &mapper);
        let staged = record();
        let mut other = record();
        other.email = Email::parse("other@b.com").unwrap();

        gate.stage(&staged);
        let err = gate.try_commit_sync(&mut other).await.unwrap_err();
        assert!(matches!(err, SyncError::UnexpectedRecord));
        assert!(!gate.is_staged());
        assert_eq!(identity.update_count(), 0);
    }

    #[tokio::test]
    async fn test_restage_replaces_candidate() {
        let identity = FakeIdentity::default();
        let mapper = mapper();
        let mut gate = SyncGate::new(&identity, &mapper);
        let first = record();
        let mut second = record();
        second.email = Email::parse("second@b.com").unwrap();

        gate.stage(&first);
        gate.stage(&second);
        assert_eq!(
            gate.try_commit_sync(&mut second).await.unwrap(),
            SyncOutcome::Synchronized
        );
    }
}
