//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use gigya_im_core::{CustomerId, Email, LocalCustomerRecord};

/// Session-stored customer identity.
///
/// Minimal data stored in the session to identify the logged-in customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentCustomer {
    /// Customer's database ID.
    pub id: CustomerId,
    /// Customer's email address.
    pub email: Email,
    /// Gigya account UID.
    pub gigya_uid: Option<String>,
}

impl CurrentCustomer {
    /// Session identity for a saved customer. `None` if it was never persisted.
    #[must_use]
    pub fn from_record(record: &LocalCustomerRecord) -> Option<Self> {
        Some(Self {
            id: record.id?,
            email: record.email.clone(),
            gigya_uid: record.gigya_uid.clone(),
        })
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in customer.
    pub const CURRENT_CUSTOMER: &str = "current_customer";
}
