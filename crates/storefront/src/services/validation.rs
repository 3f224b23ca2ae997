//! Required-field checks for accounts coming from Gigya.

use gigya_im_core::RemoteAccount;

use crate::gigya::DiagnosticLog;

/// Shown when the account has no login email.
pub const MISSING_EMAIL: &str = "Email not supplied. please make sure that your social account provides an email, or contact our support";
/// Shown when the account has no first name.
pub const MISSING_FIRST_NAME: &str = "Required field missing - first name";
/// Shown when the account has no last name.
pub const MISSING_LAST_NAME: &str = "Required field missing - last name";

/// Ordered list of customer-facing validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    /// Whether no problems were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The messages, in the order they were found.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.0
    }

    /// Consume into the messages.
    #[must_use]
    pub fn into_messages(self) -> Vec<String> {
        self.0
    }

    fn push(&mut self, message: &str) {
        self.0.push(message.to_string());
    }
}

/// Verifies that a Gigya account carries the fields a customer needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredFieldsValidator {
    diagnostics: DiagnosticLog,
}

impl RequiredFieldsValidator {
    #[must_use]
    pub const fn new(diagnostics: DiagnosticLog) -> Self {
        Self { diagnostics }
    }

    /// Check login ID, first name and last name, in that order.
    ///
    /// Blank values count as missing. Each miss adds one message.
    #[must_use]
    pub fn verify_required_fields(&self, account: &RemoteAccount) -> ValidationErrors {
        let mut errors = ValidationErrors::default();

        if account.login_id().is_none() {
            self.diagnostics.log(
                "verify_required_fields",
                "Gigya user does not have email in [loginIDs][emails] array",
            );
            errors.push(MISSING_EMAIL);
        }
        if account.profile.first_name().is_none() {
            self.diagnostics.log(
                "verify_required_fields",
                "Gigya Required field missing - first name. check that your gigya screenset has the correct required fields/complete registration settings.",
            );
            errors.push(MISSING_FIRST_NAME);
        }
        if account.profile.last_name().is_none() {
            self.diagnostics.log(
                "verify_required_fields",
                "Gigya Required field missing - last name. check that your gigya screenset has the correct required fields/complete registration settings.",
            );
            errors.push(MISSING_LAST_NAME);
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use gigya_im_core::AccountProfile;

    use super::*;

    #[test]
    fn test_complete_account() {
        let account = RemoteAccount {
            uid: "uid-1".to_string(),
            login_id: Some("a@b.com".to_string()),
            profile: AccountProfile {
                email: None,
                first_name: Some("A".to_string()),
                last_name: Some("B".to_string()),
            },
            ..RemoteAccount::default()
        };
        assert!(RequiredFieldsValidator::default()
            .verify_required_fields(&account)
            .is_empty());
    }

    #[test]
    fn test_all_missing_in_order() {
        let account = RemoteAccount {
            uid: "uid-1".to_string(),
            ..RemoteAccount::default()
        };
        let errors = RequiredFieldsValidator::new(DiagnosticLog::new(true))
            .verify_required_fields(&account);

        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.messages(),
            [MISSING_EMAIL, MISSING_FIRST_NAME, MISSING_LAST_NAME]
        );
    }

    #[test]
    fn test_blank_last_name() {
        let account = RemoteAccount {
            uid: "uid-1".to_string(),
            login_id: Some("a@b.com".to_string()),
            profile: AccountProfile {
                email: None,
                first_name: Some("A".to_string()),
                last_name: Some("  ".to_string()),
            },
            ..RemoteAccount::default()
        };
        let errors = RequiredFieldsValidator::default().verify_required_fields(&account);
        assert_eq!(errors.into_messages(), vec![MISSING_LAST_NAME.to_string()]);
    }
}
