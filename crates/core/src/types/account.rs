//! Gigya account representation.
//!
//! A [`RemoteAccount`] is built fresh for every call to the identity
//! service and is never persisted locally.

use serde::{Deserialize, Serialize};

/// Account data pushed to (or pulled from) Gigya.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteAccount {
    /// Gigya account UID.
    #[serde(rename = "UID")]
    pub uid: String,
    /// Login identifier, taken from the first email in `loginIDs.emails`.
    #[serde(rename = "loginID", skip_serializing_if = "Option::is_none")]
    pub login_id: Option<String>,
    /// Profile fields.
    pub profile: AccountProfile,
    /// Provider-specific attributes (Gigya's `data` object).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub data: serde_json::Map<String, serde_json::Value>,
    /// Commerce platform and module versions, sent as diagnostic context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

impl RemoteAccount {
    /// The login identifier, if present and not blank.
    #[must_use]
    pub fn login_id(&self) -> Option<&str> {
        non_blank(self.login_id.as_deref())
    }
}

/// Gigya profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProfile {
    /// Profile email.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// First name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Last name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl AccountProfile {
    /// The first name, if present and not blank.
    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        non_blank(self.first_name.as_deref())
    }

    /// The last name, if present and not blank.
    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        non_blank(self.last_name.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
