//! Gigya IM Storefront library.
//!
//! Customer identity (registration, profile edit, password change) is
//! delegated to Gigya while a local customer record is kept for commerce.
//! The central guarantee is that a profile change is only committed locally
//! after Gigya accepted it; see [`services::sync`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod gigya;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
