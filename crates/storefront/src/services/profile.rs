//! Customer profile flows: account edit and Gigya login.
//!
//! Both flows end in [`save_customer`] with a fresh [`SyncGate`], so a local
//! change is only committed after Gigya accepted it.

use gigya_im_core::{CustomerAddress, CustomerId, Email, LocalCustomerRecord, RemoteAccount};
use thiserror::Error;

use super::events::CustomerEvents;
use super::mapping::{AccountMapper, MappingError};
use super::password::{DEFAULT_GENERATED_LENGTH, PasswordChange, generate_password, hash_password};
use super::sync::{SyncError, SyncGate};
use super::validation::{RequiredFieldsValidator, ValidationErrors};
use crate::db::{CustomerStore, RepositoryError, SaveError, save_customer};
use crate::gigya::{DiagnosticLog, GigyaError, IdentityService};

/// Shown after a successful edit.
pub const SAVED: &str = "You saved the account information.";
/// Shown when the submitted data is rejected.
pub const INVALID_INPUT: &str = "Invalid input";
/// Shown when saving fails for any other reason.
pub const SAVE_FAILED: &str = "We can't save the customer.";

/// Errors from the profile flows that prevent any result.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The customer does not exist.
    #[error("customer not found")]
    NotFound,

    /// The Gigya login signature did not validate.
    #[error("invalid Gigya signature")]
    InvalidSignature,

    /// The Gigya account lacks required fields.
    #[error("Gigya account is missing required fields")]
    MissingFields(ValidationErrors),

    /// The customer was deleted locally.
    #[error("customer account is deleted")]
    AccountDeleted,

    /// A posted Gigya account belongs to another customer.
    #[error("Gigya account {0} is not linked to this customer")]
    AccountMismatch(String),

    /// Gigya could not be reached or rejected the request.
    #[error("Gigya error: {0}")]
    Gigya(#[from] GigyaError),

    /// The Gigya account could not be mapped to a customer.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// The customer could not be saved.
    #[error("save failed: {0}")]
    Save(#[from] SaveError),

    /// The customer could not be loaded.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// A generated password could not be hashed.
    #[error("password hashing error")]
    PasswordHash,
}

/// Data submitted from the account edit page.
#[derive(Debug, Clone, Default)]
pub struct ProfileEditForm {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Submitted addresses. Empty keeps the current ones.
    pub addresses: Vec<CustomerAddress>,
    pub change_password: bool,
    pub current_password: String,
    pub new_password: String,
    pub password_confirmation: String,
    /// Raw Gigya account posted by the profile screen-set.
    pub gigya_user: Option<serde_json::Value>,
}

/// Result of an account edit.
#[derive(Debug, Clone)]
pub struct EditReport {
    /// The customer as saved, if the save went through.
    pub customer: Option<LocalCustomerRecord>,
    /// Messages for the customer. Empty means complete success.
    pub messages: Vec<String>,
}

impl EditReport {
    /// Whether everything succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.customer.is_some() && self.messages.is_empty()
    }
}

/// Profile flows over a customer store and the identity service.
pub struct ProfileService<'a, S, I> {
    store: &'a S,
    identity: &'a I,
    mapper: &'a AccountMapper,
    events: &'a CustomerEvents,
    validator: RequiredFieldsValidator,
    diagnostics: DiagnosticLog,
}

impl<'a, S, I> ProfileService<'a, S, I>
where
    S: CustomerStore,
    I: IdentityService,
{
    /// Create a new profile service.
    #[must_use]
    pub const fn new(
        store: &'a S,
        identity: &'a I,
        mapper: &'a AccountMapper,
        events: &'a CustomerEvents,
        diagnostics: DiagnosticLog,
    ) -> Self {
        Self {
            store,
            identity,
            mapper,
            events,
            validator: RequiredFieldsValidator::new(diagnostics),
            diagnostics,
        }
    }

    // =========================================================================
    // Account edit
    // =========================================================================

    /// Apply an account edit.
    ///
    /// A failed password change is reported but does not stop the profile
    /// from being saved. The save itself is pushed to Gigya first.
    ///
    /// # Errors
    ///
    /// Returns `ProfileError::NotFound` if the customer does not exist and
    /// `ProfileError::Repository` if it cannot be loaded. Everything else is
    /// reported through [`EditReport::messages`].
    pub async fn edit_profile(
        &self,
        customer_id: CustomerId,
        form: ProfileEditForm,
    ) -> Result<EditReport, ProfileError> {
        let current = self
            .store
            .find_by_id(customer_id)
            .await?
            .ok_or(ProfileError::NotFound)?;
        let mut messages = Vec::new();

        let Ok(mut customer) = updated_customer(&current, &form) else {
            return Ok(EditReport {
                customer: None,
                messages: vec![INVALID_INPUT.to_string()],
            });
        };

        if form.change_password {
            let mut change = PasswordChange::new(self.identity);
            if let Err(e) = change
                .change_password(
                    current.email.as_str(),
                    &form.current_password,
                    &form.new_password,
                    &form.password_confirmation,
                )
                .await
            {
                messages.push(e.user_message());
            }
        }

        if let Some(raw) = &form.gigya_user {
            match self.linked_account(&current, raw) {
                Ok(account) => self.events.dispatch_user_mapped(&account, &mut customer),
                Err(e) => {
                    tracing::warn!(customer_id = %customer_id, error = %e, "Rejected posted Gigya account");
                    messages.push(INVALID_INPUT.to_string());
                    return Ok(EditReport {
                        customer: None,
                        messages,
                    });
                }
            }
        }

        let mut gate = SyncGate::new(self.identity, self.mapper);
        match save_customer(self.store, &mut gate, &mut customer).await {
            Ok(_) => Ok(EditReport {
                customer: Some(customer),
                messages,
            }),
            Err(e) => {
                messages.push(save_error_message(&e));
                Ok(EditReport {
                    customer: None,
                    messages,
                })
            }
        }
    }

    /// Map the posted account; it must be the one already linked to the customer.
    fn linked_account(
        &self,
        current: &LocalCustomerRecord,
        raw: &serde_json::Value,
    ) -> Result<RemoteAccount, ProfileError> {
        let account = self.identity.map_raw_payload_to_account(raw)?;
        match current.gigya_uid.as_deref() {
            Some(uid) if uid == account.uid => Ok(account),
            _ => Err(ProfileError::AccountMismatch(account.uid)),
        }
    }

    // =========================================================================
    // Gigya login
    // =========================================================================

    /// Log a customer in with a Gigya-signed UID, creating the local
    /// customer on first login.
    ///
    /// The saved record mirrors Gigya's data and is therefore flagged as
    /// synchronized; nothing is pushed back.
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` if the signature does not validate
    /// - `MissingFields` if the Gigya account lacks an email or a name
    /// - `AccountDeleted` if the matching customer was deleted
    /// - `Gigya`, `Mapping`, `Save`, `Repository` for the corresponding failures
    pub async fn login_federated(
        &self,
        uid: &str,
        signature: &str,
        timestamp: &str,
    ) -> Result<LocalCustomerRecord, ProfileError> {
        if !self
            .identity
            .validate_signed_token(uid, signature, timestamp, self.mapper.environment())
        {
            self.diagnostics.log(
                "login_federated",
                "Raas user validation failed. make sure to check your gigya config values. including encryption key location, and Database gigya settings",
            );
            return Err(ProfileError::InvalidSignature);
        }

        let account = self.identity.get_account(uid).await?;
        let errors = self.validator.verify_required_fields(&account);
        if !errors.is_empty() {
            return Err(ProfileError::MissingFields(errors));
        }

        let mut customer = match self.find_linked(&account).await? {
            Some(existing) if existing.is_deleted => return Err(ProfileError::AccountDeleted),
            Some(existing) => existing,
            None => {
                let mut created = self.mapper.customer_from_account(&account)?;
                let hash = hash_password(&generate_password(DEFAULT_GENERATED_LENGTH))
                    .map_err(|_| ProfileError::PasswordHash)?;
                created.password_hash = Some(hash);
                tracing::info!(uid, email = %created.email, "Creating customer from Gigya account");
                created
            }
        };

        self.events.dispatch_user_mapped(&account, &mut customer);
        customer.is_synchronized_to_gigya = true;

        let mut gate = SyncGate::new(self.identity, self.mapper);
        save_customer(self.store, &mut gate, &mut customer).await?;
        Ok(customer)
    }

    /// Find the customer for a Gigya account: by UID, then by login email.
    async fn find_linked(
        &self,
        account: &RemoteAccount,
    ) -> Result<Option<LocalCustomerRecord>, ProfileError> {
        if let Some(customer) = self.store.find_by_gigya_uid(&account.uid).await? {
            return Ok(Some(customer));
        }
        let Some(email) = account.login_id().and_then(|e| Email::parse(e).ok()) else {
            return Ok(None);
        };
        Ok(self.store.find_by_email(&email).await?)
    }
}

/// Build the updated customer from the current one and the submitted form.
///
/// The result is a new mutation and therefore not synchronized.
fn updated_customer(
    current: &LocalCustomerRecord,
    form: &ProfileEditForm,
) -> Result<LocalCustomerRecord, gigya_im_core::EmailError> {
    let mut customer = current.clone();
    customer.email = Email::parse(&form.email)?;
    customer.first_name = non_blank(form.first_name.as_deref());
    customer.last_name = non_blank(form.last_name.as_deref());
    if !form.addresses.is_empty() {
        customer.addresses.clone_from(&form.addresses);
    }
    customer.is_synchronized_to_gigya = false;
    Ok(customer)
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

/// Customer-facing message for a failed save. The cause is logged.
fn save_error_message(error: &SaveError) -> String {
    match error {
        SaveError::Sync(SyncError::Remote(e)) if e.is_authentication() => e.user_message(),
        SaveError::Sync(SyncError::Mapping(_) | SyncError::UnexpectedRecord)
        | SaveError::Repository(RepositoryError::Conflict(_)) => {
            tracing::warn!(error = %error, "Customer save rejected");
            INVALID_INPUT.to_string()
        }
        _ => {
            let event_id = sentry::capture_error(error);
            tracing::error!(error = %error, sentry_event_id = %event_id, "Customer save failed");
            SAVE_FAILED.to_string()
        }
    }
}
