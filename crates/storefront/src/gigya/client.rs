//! Gigya REST API client.
//!
//! Every call is a form POST carrying `apiKey`, `userKey`, `secret` and
//! `format=json`. Gigya answers HTTP 200 for most failures, so the
//! `errorCode` in the body is what decides success.

use std::sync::Arc;

use chrono::Utc;
use gigya_im_core::RemoteAccount;
use secrecy::ExposeSecret;
use tracing::instrument;

use super::types::{ApiStatus, account_from_payload};
use super::{DiagnosticLog, GigyaError, IdentityService, environment_param, validate_uid_signature};
use crate::config::GigyaConfig;
use crate::services::credentials::Credentials;

// ─────────────────────────────────────────────────────────────────────────────
// API Methods
// ─────────────────────────────────────────────────────────────────────────────

const GET_ACCOUNT_INFO: &str = "accounts.getAccountInfo";
const SET_ACCOUNT_INFO: &str = "accounts.setAccountInfo";
const LOGIN: &str = "accounts.login";

const ACCOUNT_INCLUDE: &str = "loginIDs,profile,data";

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// Client for the Gigya accounts API.
#[derive(Clone)]
pub struct GigyaClient {
    inner: Arc<GigyaClientInner>,
}

struct GigyaClientInner {
    client: reqwest::Client,
    credentials: Arc<Credentials>,
    environment: String,
    diagnostics: DiagnosticLog,
}

impl GigyaClient {
    /// Create a new Gigya client.
    ///
    /// # Errors
    ///
    /// Returns `GigyaError::Http` if the HTTP client cannot be built.
    pub fn new(credentials: Arc<Credentials>, config: &GigyaConfig) -> Result<Self, GigyaError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(GigyaClientInner {
                client,
                credentials,
                environment: environment_param(config),
                diagnostics: DiagnosticLog::new(config.debug_mode),
            }),
        })
    }

    /// The diagnostic environment string sent with each call.
    #[must_use]
    pub fn environment(&self) -> &str {
        &self.inner.environment
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "https://accounts.{}/{method}",
            self.inner.credentials.api_domain()
        )
    }

    /// Execute an API method and return the response body.
    async fn call(
        &self,
        method: &str,
        params: &[(&str, &str)],
    ) -> Result<serde_json::Value, GigyaError> {
        let credentials = &self.inner.credentials;
        let mut form: Vec<(&str, &str)> = vec![
            ("apiKey", credentials.api_key()),
            ("userKey", credentials.app_key()),
            ("secret", credentials.api_secret().expose_secret()),
            ("format", "json"),
            ("environment", self.inner.environment.as_str()),
        ];
        form.extend_from_slice(params);

        let response = self
            .inner
            .client
            .post(self.endpoint(method))
            .form(&form)
            .send()
            .await?;
        let body: serde_json::Value = response.json().await?;

        let status: ApiStatus = serde_json::from_value(body.clone())?;
        if let Err(e) = status.into_result() {
            self.inner.diagnostics.log(method, &e);
            tracing::warn!(method, error = %e, "Gigya call failed");
            return Err(e);
        }

        Ok(body)
    }
}

impl IdentityService for GigyaClient {
    fn validate_signed_token(
        &self,
        uid: &str,
        signature: &str,
        timestamp: &str,
        context: &str,
    ) -> bool {
        match validate_uid_signature(
            self.inner.credentials.api_secret().expose_secret(),
            uid,
            signature,
            timestamp,
            Utc::now(),
        ) {
            Ok(()) => true,
            Err(e) => {
                self.inner.diagnostics.log(
                    "validate_signed_token",
                    format_args!("UID signature rejected: {e} ({context})"),
                );
                false
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_account(&self, uid: &str) -> Result<RemoteAccount, GigyaError> {
        let body = self
            .call(GET_ACCOUNT_INFO, &[("UID", uid), ("include", ACCOUNT_INCLUDE)])
            .await?;
        account_from_payload(&body)
    }

    #[instrument(skip(self, account), fields(uid = %account.uid))]
    async fn update_account(&self, account: &RemoteAccount) -> Result<(), GigyaError> {
        let profile = serde_json::to_string(&account.profile)?;
        let data = serde_json::to_string(&account.data)?;

        let mut params = vec![("UID", account.uid.as_str()), ("profile", profile.as_str())];
        if !account.data.is_empty() {
            params.push(("data", data.as_str()));
        }

        self.call(SET_ACCOUNT_INFO, &params).await?;
        tracing::info!("Gigya account updated");
        Ok(())
    }

    #[instrument(skip(self, current_password, new_password))]
    async fn change_password(
        &self,
        login_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), GigyaError> {
        // accounts.login verifies the current password and resolves the UID
        let session = self
            .call(LOGIN, &[("loginID", login_id), ("password", current_password)])
            .await?;
        let uid = session
            .get("UID")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| GigyaError::InvalidPayload("login response without UID".to_string()))?;

        self.call(
            SET_ACCOUNT_INFO,
            &[
                ("UID", uid),
                ("password", current_password),
                ("newPassword", new_password),
            ],
        )
        .await?;
        tracing::info!(uid, "Gigya password changed");
        Ok(())
    }
}
