//! In-process customer events.
//!
//! Listeners run synchronously, in registration order, before the customer
//! is saved, and may enrich the record.

use gigya_im_core::{LocalCustomerRecord, RemoteAccount};

use super::mapping::AccountMapper;

/// Name under which the "user mapped" event is published.
pub const USER_MAPPED_EVENT: &str = "gigya_post_user_create";

/// Receives customer events.
pub trait CustomerEventListener: Send + Sync {
    /// Listener name, for logs.
    fn name(&self) -> &'static str;

    /// A Gigya account was mapped onto `customer`, which is about to be saved.
    fn on_user_mapped(&self, account: &RemoteAccount, customer: &mut LocalCustomerRecord);
}

/// Registry of [`CustomerEventListener`]s.
#[derive(Default)]
pub struct CustomerEvents {
    listeners: Vec<Box<dyn CustomerEventListener>>,
}

impl CustomerEvents {
    /// Create a registry with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in listeners.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut events = Self::new();
        events.register(ProfileFieldMapper);
        events
    }

    /// Add a listener.
    pub fn register(&mut self, listener: impl CustomerEventListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Publish the "user mapped" event.
    pub fn dispatch_user_mapped(&self, account: &RemoteAccount, customer: &mut LocalCustomerRecord) {
        for listener in &self.listeners {
            tracing::debug!(
                event = USER_MAPPED_EVENT,
                listener = listener.name(),
                uid = %account.uid,
                "Dispatching customer event"
            );
            listener.on_user_mapped(account, customer);
        }
    }
}

/// Copies the Gigya UID and profile names onto the customer.
pub struct ProfileFieldMapper;

impl CustomerEventListener for ProfileFieldMapper {
    fn name(&self) -> &'static str {
        "profile_field_mapper"
    }

    fn on_user_mapped(&self, account: &RemoteAccount, customer: &mut LocalCustomerRecord) {
        AccountMapper::apply_account(customer, account);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use gigya_im_core::{AccountProfile, Email};

    use super::*;

    struct Recorder {
        name: &'static str,
        seen: std::sync::Arc<Mutex<Vec<&'static str>>>,
    }

    impl CustomerEventListener for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn on_user_mapped(&self, _: &RemoteAccount, customer: &mut LocalCustomerRecord) {
            self.seen.lock().unwrap().push(self.name);
            customer.last_name = Some(self.name.to_string());
        }
    }

    fn account() -> RemoteAccount {
        RemoteAccount {
            uid: "uid-1".to_string(),
            profile: AccountProfile {
                email: None,
                first_name: Some("Ada".to_string()),
                last_name: Some("Lovelace".to_string()),
            },
            ..RemoteAccount::default()
        }
    }

    #[test]
    fn test_default_listener_maps_profile() {
        let events = CustomerEvents::with_defaults();
        let mut customer = LocalCustomerRecord::new(Email::parse("a@b.com").unwrap());

        events.dispatch_user_mapped(&account(), &mut customer);

        assert_eq!(customer.gigya_uid.as_deref(), Some("uid-1"));
        assert_eq!(customer.first_name.as_deref(), Some("Ada"));
        assert_eq!(customer.last_name.as_deref(), Some("Lovelace"));
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let mut events = CustomerEvents::with_defaults();
        events.register(Recorder {
            name: "first",
            seen: seen.clone(),
        });
        events.register(Recorder {
            name: "second",
            seen: seen.clone(),
        });
        assert_eq!(events.len(), 3);

        let mut customer = LocalCustomerRecord::new(Email::parse("a@b.com").unwrap());
        events.dispatch_user_mapped(&account(), &mut customer);

        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(customer.last_name.as_deref(), Some("second"));
    }

    #[test]
    fn test_empty_registry_leaves_customer_untouched() {
        let events = CustomerEvents::new();
        assert!(events.is_empty());

        let mut customer = LocalCustomerRecord::new(Email::parse("a@b.com").unwrap());
        let before = customer.clone();
        events.dispatch_user_mapped(&account(), &mut customer);
        assert_eq!(customer, before);
    }
}
