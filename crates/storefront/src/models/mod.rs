//! Domain models for storefront.
//!
//! Customer records themselves live in `gigya_im_core`; this module holds
//! the types that only the HTTP layer needs.

pub mod session;

pub use session::CurrentCustomer;
pub use session::keys as session_keys;
