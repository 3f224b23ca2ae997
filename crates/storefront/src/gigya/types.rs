//! Gigya REST API payload types.

use gigya_im_core::{AccountProfile, RemoteAccount};
use serde::Deserialize;

use super::GigyaError;

/// Status envelope present on every Gigya response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ApiStatus {
    #[serde(default)]
    pub error_code: i64,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
    pub call_id: Option<String>,
}

impl ApiStatus {
    pub(super) fn into_result(self) -> Result<(), GigyaError> {
        if self.error_code == 0 {
            return Ok(());
        }
        Err(GigyaError::Api {
            code: self.error_code,
            message: self
                .error_message
                .unwrap_or_else(|| "Unknown error".to_string()),
            details: self.error_details,
            call_id: self.call_id,
        })
    }
}

/// Account as returned by `accounts.getAccountInfo` and posted by the
/// Gigya screen-sets.
#[derive(Debug, Deserialize)]
struct RawAccount {
    #[serde(rename = "UID", default)]
    uid: String,
    #[serde(rename = "loginIDs", default)]
    login_ids: Option<LoginIds>,
    #[serde(default)]
    profile: Option<AccountProfile>,
    #[serde(default)]
    data: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct LoginIds {
    #[serde(default)]
    emails: Vec<String>,
}

/// Map a raw Gigya account object to a [`RemoteAccount`].
///
/// The login ID is the first entry of `loginIDs.emails`. Missing `profile`
/// and `data` sections map to empty values.
///
/// # Errors
///
/// Returns `GigyaError::InvalidPayload` if `UID` is missing or blank and
/// `GigyaError::Parse` if a section has the wrong shape.
pub fn account_from_payload(raw: &serde_json::Value) -> Result<RemoteAccount, GigyaError> {
    if !raw.is_object() {
        return Err(GigyaError::InvalidPayload(
            "account payload is not an object".to_string(),
        ));
    }
    let account = RawAccount::deserialize(raw)?;
    if account.uid.trim().is_empty() {
        return Err(GigyaError::InvalidPayload("missing UID".to_string()));
    }

    Ok(RemoteAccount {
        uid: account.uid,
        login_id: account
            .login_ids
            .unwrap_or_default()
            .emails
            .into_iter()
            .next(),
        profile: account.profile.unwrap_or_default(),
        data: account.data.unwrap_or_default(),
        environment: None,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_account_from_payload() {
        let raw = json!({
            "UID": "uid-1",
            "loginIDs": {"emails": ["a@b.com", "other@b.com"], "unverifiedEmails": []},
            "profile": {"email": "a@b.com", "firstName": "A", "lastName": "B", "age": 30},
            "data": {"newsletter": true},
            "statusCode": 200
        });

        let account = account_from_payload(&raw).unwrap();
        assert_eq!(account.uid, "uid-1");
        assert_eq!(account.login_id(), Some("a@b.com"));
        assert_eq!(account.profile.first_name(), Some("A"));
        assert_eq!(account.profile.last_name(), Some("B"));
        assert_eq!(account.data.get("newsletter"), Some(&json!(true)));
        assert_eq!(account.environment, None);
    }

    #[test]
    fn test_minimal_payload() {
        let account = account_from_payload(&json!({"UID": "uid-1", "data": null})).unwrap();
        assert_eq!(account.login_id(), None);
        assert_eq!(account.profile, AccountProfile::default());
        assert!(account.data.is_empty());
    }

    #[test]
    fn test_missing_uid() {
        assert!(matches!(
            account_from_payload(&json!({"profile": {}})),
            Err(GigyaError::InvalidPayload(_))
        ));
        assert!(matches!(
            account_from_payload(&json!("uid-1")),
            Err(GigyaError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_wrong_shape() {
        assert!(matches!(
            account_from_payload(&json!({"UID": "uid-1", "loginIDs": {"emails": "a@b.com"}})),
            Err(GigyaError::Parse(_))
        ));
    }

    #[test]
    fn test_api_status() {
        let ok: ApiStatus = serde_json::from_value(json!({"errorCode": 0, "callId": "c"})).unwrap();
        assert!(ok.into_result().is_ok());

        let err: ApiStatus = serde_json::from_value(json!({
            "errorCode": 403042,
            "errorMessage": "Invalid LoginID",
            "errorDetails": "invalid loginID or password",
            "callId": "c"
        }))
        .unwrap();
        let err = err.into_result().unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(err.user_message(), "invalid loginID or password");
    }
}
