//! Mapping between local customer records and Gigya accounts.

use gigya_im_core::{AccountProfile, Email, EmailError, LocalCustomerRecord, RemoteAccount};
use thiserror::Error;

use crate::config::GigyaConfig;
use crate::gigya::environment_param;

/// Errors that can occur while mapping.
#[derive(Debug, Error)]
pub enum MappingError {
    /// The customer is not linked to a Gigya account.
    #[error("customer has no Gigya UID")]
    MissingUid,

    /// The Gigya account has no email to identify the customer by.
    #[error("Gigya account has no email")]
    MissingEmail,

    /// The Gigya account's email is not a valid address.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

/// Builds [`RemoteAccount`]s from local records and back.
#[derive(Debug, Clone)]
pub struct AccountMapper {
    environment: String,
}

impl AccountMapper {
    /// Create a mapper attaching `environment` to every account it builds.
    #[must_use]
    pub const fn new(environment: String) -> Self {
        Self { environment }
    }

    /// Create a mapper from the Gigya settings.
    #[must_use]
    pub fn from_config(config: &GigyaConfig) -> Self {
        Self::new(environment_param(config))
    }

    /// The diagnostic environment string.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Build the account to push to Gigya for `record`.
    ///
    /// The login ID and profile email are the record's email.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::MissingUid` if the record is not linked to Gigya.
    pub fn enrich(&self, record: &LocalCustomerRecord) -> Result<RemoteAccount, MappingError> {
        let uid = record
            .gigya_uid
            .as_deref()
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .ok_or(MappingError::MissingUid)?;

        Ok(RemoteAccount {
            uid: uid.to_string(),
            login_id: Some(record.email.as_str().to_string()),
            profile: AccountProfile {
                email: Some(record.email.as_str().to_string()),
                first_name: record.first_name.clone(),
                last_name: record.last_name.clone(),
            },
            data: serde_json::Map::new(),
            environment: Some(self.environment.clone()),
        })
    }

    /// Build a new local record from a Gigya account.
    ///
    /// The email is the login ID, falling back to the profile email.
    ///
    /// # Errors
    ///
    /// Returns `MappingError::MissingEmail` if the account has neither, and
    /// `MappingError::InvalidEmail` if the address does not parse.
    pub fn customer_from_account(
        &self,
        account: &RemoteAccount,
    ) -> Result<LocalCustomerRecord, MappingError> {
        let email = account
            .login_id()
            .or_else(|| {
                account
                    .profile
                    .email
                    .as_deref()
                    .filter(|e| !e.trim().is_empty())
            })
            .ok_or(MappingError::MissingEmail)?;

        let mut record = LocalCustomerRecord::new(Email::parse(email)?);
        Self::apply_account(&mut record, account);
        Ok(record)
    }

    /// Copy the UID and the non-blank profile names of `account` onto `record`.
    pub fn apply_account(record: &mut LocalCustomerRecord, account: &RemoteAccount) {
        record.gigya_uid = Some(account.uid.clone());
        if let Some(first_name) = account.profile.first_name() {
            record.first_name = Some(first_name.to_string());
        }
        if let Some(last_name) = account.profile.last_name() {
            record.last_name = Some(last_name.to_string());
        }
    }
}
