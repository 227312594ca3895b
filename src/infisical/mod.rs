//! Infisical Integration
//!
//! Universal Auth token exchange and scoped secret listing against an
//! Infisical instance. Tokens are requested per lookup and never cached.

pub mod client;
pub mod types;

pub use client::InfisicalClient;
pub use types::InfisicalError;
