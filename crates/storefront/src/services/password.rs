//! Password change and password generation.

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, SaltString, rand_core::OsRng},
};
use rand::Rng;
use thiserror::Error;

use crate::gigya::{GigyaError, IdentityService};

/// Shown when no new password was entered.
pub const MISSING_NEW_PASSWORD: &str = "Please enter new password.";
/// Shown when the confirmation differs from the new password.
pub const PASSWORD_MISMATCH: &str = "Confirm your new password.";
/// Shown for any failure other than wrong credentials.
pub const CHANGE_FAILED: &str = "Something went wrong while changing the password.";

/// Default number of random characters in a generated password.
pub const DEFAULT_GENERATED_LENGTH: usize = 8;
const GENERATED_PREFIX: &str = "Gigya_";
const CHARS_LOWERS: &str = "abcdefghjkmnpqrstuvwxyz";
const CHARS_UPPERS: &str = "ABCDEFGHJKLMNPQRSTUVWXYZ";
const CHARS_DIGITS: &str = "23456789";
const CHARS_SPECIALS: &str = "!$*-.=?@_";

/// Errors from a password change.
#[derive(Debug, Error)]
pub enum PasswordChangeError {
    /// The submitted passwords were rejected before contacting Gigya.
    #[error("{0}")]
    Validation(&'static str),

    /// Gigya rejected the current password.
    #[error("{message}")]
    Authentication {
        message: String,
        #[source]
        source: GigyaError,
    },

    /// Any other Gigya failure.
    #[error("password change failed: {source}")]
    Remote {
        #[source]
        source: GigyaError,
    },
}

impl PasswordChangeError {
    /// Message suitable for showing to the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => (*message).to_string(),
            Self::Authentication { message, .. } => message.clone(),
            Self::Remote { .. } => CHANGE_FAILED.to_string(),
        }
    }
}

impl From<GigyaError> for PasswordChangeError {
    fn from(source: GigyaError) -> Self {
        if source.is_authentication() {
            Self::Authentication {
                message: source.user_message(),
                source,
            }
        } else {
            Self::Remote { source }
        }
    }
}

/// Progress of a [`PasswordChange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordChangeState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

/// Validates a password change and forwards it to Gigya.
///
/// Never touches the customer's sync flag.
pub struct PasswordChange<'a, I> {
    identity: &'a I,
    state: PasswordChangeState,
}

impl<'a, I: IdentityService> PasswordChange<'a, I> {
    #[must_use]
    pub const fn new(identity: &'a I) -> Self {
        Self {
            identity,
            state: PasswordChangeState::Idle,
        }
    }

    #[must_use]
    pub const fn state(&self) -> PasswordChangeState {
        self.state
    }

    /// Change the password of the account identified by `login_id`.
    ///
    /// `new_password` and `confirmation` must be byte-for-byte equal.
    ///
    /// # Errors
    ///
    /// - `Validation` if the new password is empty or not confirmed (Gigya is not called)
    /// - `Authentication` if Gigya rejects the current password
    /// - `Remote` for any other Gigya failure
    pub async fn change_password(
        &mut self,
        login_id: &str,
        current_password: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<(), PasswordChangeError> {
        self.state = PasswordChangeState::Validating;
        if new_password.is_empty() {
            return Err(self.fail(PasswordChangeError::Validation(MISSING_NEW_PASSWORD)));
        }
        if new_password != confirmation {
            return Err(self.fail(PasswordChangeError::Validation(PASSWORD_MISMATCH)));
        }

        self.state = PasswordChangeState::Submitting;
        match self
            .identity
            .change_password(login_id, current_password, new_password)
            .await
        {
            Ok(()) => {
                self.state = PasswordChangeState::Succeeded;
                tracing::info!(login_id, "Password changed");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(login_id, error = %e, "Password change rejected");
                Err(self.fail(e.into()))
            }
        }
    }

    fn fail(&mut self, error: PasswordChangeError) -> PasswordChangeError {
        self.state = PasswordChangeState::Failed;
        error
    }
}

/// Generate a password: `Gigya_` followed by `len` characters from an
/// alphabet without look-alike characters.
#[must_use]
pub fn generate_password(len: usize) -> String {
    let chars: Vec<char> = [CHARS_LOWERS, CHARS_UPPERS, CHARS_DIGITS, CHARS_SPECIALS]
        .concat()
        .chars()
        .collect();
    let mut rng = rand::rng();

    let mut password = String::with_capacity(GENERATED_PREFIX.len() + len);
    password.push_str(GENERATED_PREFIX);
    for _ in 0..len {
        if let Some(c) = chars.get(rng.random_range(0..chars.len())) {
            password.push(*c);
        }
    }
    password
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns the hasher error if hashing fails.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use argon2::password_hash::{PasswordHash, PasswordVerifier};
    use gigya_im_core::RemoteAccount;

    use super::*;
    use crate::gigya::ERROR_INVALID_LOGIN;

    #[derive(Default)]
    struct FakeIdentity {
        calls: Mutex<Vec<(String, String, String)>>,
        error_code: Option<i64>,
    }

    impl IdentityService for FakeIdentity {
        fn validate_signed_token(&self, _: &str, _: &str, _: &str, _: &str) -> bool {
            true
        }

        async fn get_account(&self, _: &str) -> Result<RemoteAccount, GigyaError> {
            Ok(RemoteAccount::default())
        }

        async fn update_account(&self, _: &RemoteAccount) -> Result<(), GigyaError> {
            Ok(())
        }

        async fn change_password(&self, login_id: &str, current: &str, new: &str) -> Result<(), GigyaError> {
            self.calls
                .lock()
                .unwrap()
                .push((login_id.to_string(), current.to_string(), new.to_string()));
            match self.error_code {
                Some(code) => Err(GigyaError::Api {
                    code,
                    message: "Invalid LoginID".to_string(),
                    details: Some("The password doesn't match this account.".to_string()),
                    call_id: None,
                }),
                None => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_new_password() {
        let identity = FakeIdentity::default();
        let mut change = PasswordChange::new(&identity);

        let err = change.change_password("a@b.com", "old", "", "").await.unwrap_err();
        assert_eq!(err.user_message(), MISSING_NEW_PASSWORD);
        assert_eq!(change.state(), PasswordChangeState::Failed);
        assert!(identity.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirmation_mismatch() {
        let identity = FakeIdentity::default();
        let mut change = PasswordChange::new(&identity);

        let err = change
            .change_password("a@b.com", "old", "new-pass", "new-Pass")
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), PASSWORD_MISMATCH);
        assert!(identity.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_matching_passwords_call_once() {
        let identity = FakeIdentity::default();
        let mut change = PasswordChange::new(&identity);
        assert_eq!(change.state(), PasswordChangeState::Idle);

        change
            .change_password("a@b.com", "old", "new-pass", "new-pass")
            .await
            .unwrap();

        assert_eq!(change.state(), PasswordChangeState::Succeeded);
        assert_eq!(
            *identity.calls.lock().unwrap(),
            vec![(
                "a@b.com".to_string(),
                "old".to_string(),
                "new-pass".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_authentication_failure_passes_message_through() {
        let identity = FakeIdentity {
            error_code: Some(ERROR_INVALID_LOGIN),
            ..FakeIdentity::default()
        };
        let mut change = PasswordChange::new(&identity);

        let err = change
            .change_password("a@b.com", "wrong", "new-pass", "new-pass")
            .await
            .unwrap_err();
        assert!(matches!(err, PasswordChangeError::Authentication { .. }));
        assert_eq!(err.user_message(), "The password doesn't match this account.");
        assert_eq!(change.state(), PasswordChangeState::Failed);
    }

    #[tokio::test]
    async fn test_other_failure_is_generic() {
        let identity = FakeIdentity {
            error_code: Some(500_001),
            ..FakeIdentity::default()
        };
        let mut change = PasswordChange::new(&identity);

        let err = change
            .change_password("a@b.com", "old", "new-pass", "new-pass")
            .await
            .unwrap_err();
        assert!(matches!(err, PasswordChangeError::Remote { .. }));
        assert_eq!(err.user_message(), CHANGE_FAILED);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_generate_password() {
        let alphabet = [CHARS_LOWERS, CHARS_UPPERS, CHARS_DIGITS, CHARS_SPECIALS].concat();

        let password = generate_password(DEFAULT_GENERATED_LENGTH);
        let suffix = password.strip_prefix("Gigya_").unwrap();
        assert_eq!(suffix.chars().count(), DEFAULT_GENERATED_LENGTH);
        assert!(suffix.chars().all(|c| alphabet.contains(c)));

        assert_eq!(generate_password(0), "Gigya_");
        assert_eq!(generate_password(20).len(), 26);
    }

    #[test]
    fn test_alphabet_has_no_lookalikes() {
        let alphabet = [CHARS_LOWERS, CHARS_UPPERS, CHARS_DIGITS].concat();
        for c in ['i', 'l', 'o', 'I', 'O', '0', '1'] {
            assert!(!alphabet.contains(c), "{c} should not be in the alphabet");
        }
    }

    #[test]
    fn test_hash_password_verifies() {
        let hash = hash_password("Gigya_abc").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"Gigya_abc", &parsed).is_ok());
    }
}
