//! Gigya identity service integration.
//!
//! # Architecture
//!
//! - [`IdentityService`] is the seam the rest of the crate talks to
//! - [`GigyaClient`] implements it against the Gigya REST API (form POSTs to
//!   `https://accounts.{domain}/{method}`)
//! - Tests substitute in-process fakes for the trait
//!
//! # Example
//!
//! ```rust,ignore
//! use gigya_im_storefront::gigya::{GigyaClient, IdentityService};
//!
//! let client = GigyaClient::new(credentials, &config.gigya)?;
//! let account = client.get_account("uid-123").await?;
//! ```

mod client;
mod diagnostics;
mod signature;
mod types;

pub use client::GigyaClient;
pub use diagnostics::DiagnosticLog;
pub use signature::{SIGNATURE_MAX_AGE, SignatureError, validate_uid_signature};
pub use types::account_from_payload;

use std::future::Future;

use gigya_im_core::RemoteAccount;
use thiserror::Error;

use crate::config::GigyaConfig;

/// Gigya error code: invalid login ID or password.
pub const ERROR_INVALID_LOGIN: i64 = 403_042;
/// Gigya error code: invalid password.
pub const ERROR_INVALID_PASSWORD: i64 = 403_120;

/// Errors that can occur when interacting with Gigya.
#[derive(Debug, Error)]
pub enum GigyaError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Gigya answered with a non-zero `errorCode`.
    #[error("Gigya error {code}: {message}")]
    Api {
        /// Gigya `errorCode`.
        code: i64,
        /// Gigya `errorMessage`.
        message: String,
        /// Gigya `errorDetails`, when provided.
        details: Option<String>,
        /// Gigya `callId`, for support requests.
        call_id: Option<String>,
    },

    /// An account payload was missing required parts.
    #[error("Invalid account payload: {0}")]
    InvalidPayload(String),
}

impl GigyaError {
    /// Whether this is an authentication failure (wrong login or password).
    #[must_use]
    pub const fn is_authentication(&self) -> bool {
        matches!(
            self,
            Self::Api {
                code: ERROR_INVALID_LOGIN | ERROR_INVALID_PASSWORD,
                ..
            }
        )
    }

    /// Message suitable for showing to the customer.
    ///
    /// Only Gigya's own wording is passed through; transport and parse
    /// failures get a generic text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api {
                message, details, ..
            } => details
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(message)
                .to_string(),
            Self::Http(_) | Self::Parse(_) => "The identity service is unavailable.".to_string(),
            Self::InvalidPayload(_) => "The identity service returned an invalid account.".to_string(),
        }
    }
}

/// Operations the storefront needs from the identity service.
pub trait IdentityService: Send + Sync {
    /// Check a `UIDSignature` issued by Gigya for `uid` at `timestamp`.
    ///
    /// `context` is the diagnostic environment string, logged on failure.
    fn validate_signed_token(
        &self,
        uid: &str,
        signature: &str,
        timestamp: &str,
        context: &str,
    ) -> bool;

    /// Fetch an account by UID.
    fn get_account(
        &self,
        uid: &str,
    ) -> impl Future<Output = Result<RemoteAccount, GigyaError>> + Send;

    /// Push profile and data fields of an account.
    fn update_account(
        &self,
        account: &RemoteAccount,
    ) -> impl Future<Output = Result<(), GigyaError>> + Send;

    /// Change the password of the account whose login ID is `login_id`.
    ///
    /// Authentication failures satisfy [`GigyaError::is_authentication`].
    fn change_password(
        &self,
        login_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> impl Future<Output = Result<(), GigyaError>> + Send;

    /// Turn a raw Gigya account JSON object into a [`RemoteAccount`].
    ///
    /// # Errors
    ///
    /// Returns `GigyaError::InvalidPayload` if the UID is missing and
    /// `GigyaError::Parse` if a section has the wrong shape.
    fn map_raw_payload_to_account(
        &self,
        raw: &serde_json::Value,
    ) -> Result<RemoteAccount, GigyaError> {
        account_from_payload(raw)
    }
}

/// Diagnostic environment string attached to every Gigya call.
///
/// Format: `cms_version:{platform}_{version},gigya_version:Gigya_module_{module}`.
#[must_use]
pub fn environment_param(config: &GigyaConfig) -> String {
    format!(
        "cms_version:{}_{},gigya_version:Gigya_module_{}",
        config.platform_name,
        config.platform_version,
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: i64, details: Option<&str>) -> GigyaError {
        GigyaError::Api {
            code,
            message: "Invalid LoginID".to_string(),
            details: details.map(String::from),
            call_id: Some("call-1".to_string()),
        }
    }

    #[test]
    fn test_is_authentication() {
        assert!(api_error(ERROR_INVALID_LOGIN, None).is_authentication());
        assert!(api_error(ERROR_INVALID_PASSWORD, None).is_authentication());
        assert!(!api_error(500_001, None).is_authentication());
        assert!(!GigyaError::InvalidPayload("x".to_string()).is_authentication());
    }

    #[test]
    fn test_user_message_prefers_details() {
        assert_eq!(
            api_error(ERROR_INVALID_LOGIN, Some("Wrong password")).user_message(),
            "Wrong password"
        );
        assert_eq!(
            api_error(ERROR_INVALID_LOGIN, Some("  ")).user_message(),
            "Invalid LoginID"
        );
    }

    #[test]
    fn test_user_message_hides_payload_details() {
        let err = GigyaError::InvalidPayload("missing UID in {...}".to_string());
        assert!(!err.user_message().contains("UID"));
    }

    #[test]
    fn test_environment_param() {
        let config = GigyaConfig {
            api_key: String::new(),
            domain: "us1.gigya.com".to_string(),
            app_key: String::new(),
            key_file_location: None,
            debug_mode: false,
            request_timeout: std::time::Duration::from_secs(30),
            platform_name: "Storefront".to_string(),
            platform_version: "2.1.0".to_string(),
        };
        assert_eq!(
            environment_param(&config),
            format!(
                "cms_version:Storefront_2.1.0,gigya_version:Gigya_module_{}",
                env!("CARGO_PKG_VERSION")
            )
        );
    }
}
