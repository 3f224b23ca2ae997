//! Core types for Gigya IM.
//!
//! This module provides type-safe wrappers for the customer identity domain.

pub mod account;
pub mod customer;
pub mod email;
pub mod id;

pub use account::{AccountProfile, RemoteAccount};
pub use customer::{CustomerAddress, LocalCustomerRecord};
pub use email::{Email, EmailError};
pub use id::*;
