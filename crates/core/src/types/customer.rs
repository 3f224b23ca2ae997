//! Local customer record kept by the commerce database.
//!
//! Gigya owns the customer's identity; this record is the commerce-side copy
//! used for orders, addresses and anything else the storefront needs
//! without a round trip to the identity service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::{AddressId, CustomerId};

/// A customer as stored in the local commerce database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCustomerRecord {
    /// Database ID. `None` until the record has been inserted.
    pub id: Option<CustomerId>,
    /// Customer's email address (also the Gigya login identifier).
    pub email: Email,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// Gigya account UID linked to this customer.
    pub gigya_uid: Option<String>,
    /// Shipping and billing addresses.
    pub addresses: Vec<CustomerAddress>,
    /// Whether the current state of this record has been accepted by Gigya.
    ///
    /// Only the sync gate sets this to `true` after a successful push, or the
    /// federated login path when the record was built from Gigya's own data.
    pub is_synchronized_to_gigya: bool,
    /// Soft-delete marker. Deleted records are never pushed to Gigya.
    pub is_deleted: bool,
    /// Argon2 hash of the local password. Federated customers get a hash of
    /// a generated password they never learn.
    #[serde(skip)]
    pub password_hash: Option<String>,
    /// When the record was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the record was last updated.
    pub updated_at: Option<DateTime<Utc>>,
}

impl LocalCustomerRecord {
    /// Create a new, not yet persisted, customer record.
    #[must_use]
    pub const fn new(email: Email) -> Self {
        Self {
            id: None,
            email,
            first_name: None,
            last_name: None,
            gigya_uid: None,
            addresses: Vec::new(),
            is_synchronized_to_gigya: false,
            is_deleted: false,
            password_hash: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Get the customer's full name.
    #[must_use]
    pub fn full_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => String::new(),
        }
    }

    /// Whether the record has been persisted at least once.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// A customer's shipping or billing address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAddress {
    /// Database ID. `None` until the address has been inserted.
    pub id: Option<AddressId>,
    /// First name on the address.
    pub first_name: String,
    /// Last name on the address.
    pub last_name: String,
    /// Street lines, joined with newlines.
    pub street: String,
    /// City.
    pub city: String,
    /// Postal/ZIP code.
    pub postcode: String,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: String,
    /// Contact phone number.
    pub telephone: Option<String>,
    /// Default billing address.
    pub is_default_billing: bool,
    /// Default shipping address.
    pub is_default_shipping: bool,
}
