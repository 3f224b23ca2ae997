//! CLI command implementations.

pub mod credentials;
pub mod migrate;
pub mod password;
pub mod secret;
