//! Business logic services for storefront.
//!
//! # Services
//!
//! - `credentials` - Gigya credential loading (encrypted app secret + key file)
//! - `mapping` - Local customer record to Gigya account mapping
//! - `sync` - Sync gate between the local transaction and Gigya
//! - `validation` - Required-field checks for Gigya accounts
//! - `password` - Password change orchestration and generation
//! - `events` - In-process customer events
//! - `profile` - Account edit and Gigya login flows

pub mod credentials;
pub mod events;
pub mod mapping;
pub mod password;
pub mod profile;
pub mod sync;
pub mod validation;

pub use credentials::{CredentialError, CredentialResolver, Credentials};
pub use events::{CustomerEventListener, CustomerEvents};
pub use mapping::{AccountMapper, MappingError};
pub use password::{PasswordChange, PasswordChangeError, generate_password};
pub use profile::{EditReport, ProfileEditForm, ProfileError, ProfileService};
pub use sync::{SyncError, SyncGate, SyncOutcome};
pub use validation::{RequiredFieldsValidator, ValidationErrors};
