//! Infisical Secrets Bridge Library
//!
//! Resolves secret values for a plugin host from Infisical: validates the
//! connection config, exchanges Universal Auth credentials for a token, lists
//! the scope and returns the requested keys.

pub mod config;
pub mod infisical;
pub mod lookup;
pub mod plugin;
pub mod server;
pub mod settings;
pub mod validation;

pub use config::ConnectionConfig;
pub use infisical::InfisicalClient;
pub use lookup::{LookupError, LookupOrchestrator, LookupRequest};
pub use plugin::SecretsPlugin;
