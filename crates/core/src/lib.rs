//! Gigya IM Core - Shared types library.
//!
//! This crate provides the types shared by every Gigya IM component:
//! - `storefront` - Customer-facing server that delegates identity to Gigya
//! - `cli` - Operator tools (migrations, secret provisioning)
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Both the local commerce record and the identity
//! service's account representation live here so that mapping code and
//! tests can share them.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, local customer records and remote accounts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
