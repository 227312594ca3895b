//! Secret Lookup
//!
//! Drives one lookup from credentials to resolved values:
//!
//! ```text
//! Idle -> Authenticating -> Fetching -> Done
//!              |               |
//!              +---> Failed <--+
//! ```
//!
//! Every call authenticates afresh; nothing is cached between lookups, so
//! concurrent lookups share no mutable state.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{ConfigError, ConnectionConfig};
use crate::infisical::InfisicalError;

/// Short-lived bearer token bound to the Infisical instance that issued it
#[derive(Debug)]
pub struct AccessToken {
    base_url: String,
    token: SecretString,
    expires_in: Option<u64>,
}

impl AccessToken {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: SecretString::from(token.into()),
            expires_in: None,
        }
    }

    pub fn with_expires_in(mut self, seconds: u64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// Instance the token is valid for
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn secret(&self) -> &SecretString {
        &self.token
    }

    /// Lifetime in seconds as reported at issue time
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }
}

/// Project, environment and folder a listing is restricted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretScope {
    pub project_id: String,
    pub environment_slug: String,
    pub secret_path: String,
}

impl From<&ConnectionConfig> for SecretScope {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            project_id: config.project_id().to_string(),
            environment_slug: config.environment_slug().to_string(),
            secret_path: config.secret_path().to_string(),
        }
    }
}

/// A key and its resolved value.
///
/// `Debug` redacts the value; serialization emits it, since handing it back
/// to the host is the point of a lookup.
#[derive(Debug)]
pub struct SecretEntry {
    pub key: String,
    pub value: SecretString,
}

impl SecretEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: SecretString::from(value.into()),
        }
    }
}

impl Serialize for SecretEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SecretEntry", 2)?;
        state.serialize_field("key", &self.key)?;
        state.serialize_field("value", self.value.expose_secret())?;
        state.end()
    }
}

/// Matched entries in remote listing order
pub type LookupResult = Vec<SecretEntry>;

/// One inbound lookup: where to look and which keys to resolve
#[derive(Debug)]
pub struct LookupRequest {
    pub config: ConnectionConfig,
    pub keys: Vec<String>,
}

impl LookupRequest {
    pub fn new(config: ConnectionConfig, keys: Vec<String>) -> Self {
        Self { config, keys }
    }
}

/// Exchanges client credentials for an access token
#[async_trait]
pub trait AuthClient: Send + Sync {
    async fn authenticate(
        &self,
        base_url: &str,
        client_id: &SecretString,
        client_secret: &SecretString,
    ) -> Result<AccessToken, InfisicalError>;
}

/// Lists every secret visible in a scope, references and imports expanded
#[async_trait]
pub trait SecretFetcher: Send + Sync {
    async fn list_secrets(
        &self,
        token: &AccessToken,
        scope: &SecretScope,
    ) -> Result<Vec<SecretEntry>, InfisicalError>;
}

/// Reportable lookup failures
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Invalid Infisical configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("Failed to authenticate with Infisical: {0}")]
    Authentication(#[source] InfisicalError),

    #[error("Failed to fetch secrets from Infisical: {0}")]
    Fetch(#[source] InfisicalError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LookupState {
    Authenticating,
    Fetching,
    Done,
    Failed,
}

impl std::fmt::Display for LookupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupState::Authenticating => write!(f, "authenticating"),
            LookupState::Fetching => write!(f, "fetching"),
            LookupState::Done => write!(f, "done"),
            LookupState::Failed => write!(f, "failed"),
        }
    }
}

/// Composes authentication and listing into a single lookup
#[derive(Clone)]
pub struct LookupOrchestrator {
    auth: Arc<dyn AuthClient>,
    fetcher: Arc<dyn SecretFetcher>,
}

impl LookupOrchestrator {
    pub fn new(auth: Arc<dyn AuthClient>, fetcher: Arc<dyn SecretFetcher>) -> Self {
        Self { auth, fetcher }
    }

    /// Use one client for both halves of the exchange
    pub fn from_client<C>(client: C) -> Self
    where
        C: AuthClient + SecretFetcher + 'static,
    {
        let client = Arc::new(client);
        Self {
            auth: client.clone(),
            fetcher: client,
        }
    }

    /// Run one lookup start to finish.
    ///
    /// Keys missing from the remote scope are dropped silently; an empty
    /// result is a success.
    pub async fn lookup(&self, request: &LookupRequest) -> Result<LookupResult, LookupError> {
        let config = &request.config;
        let span = info_span!(
            "lookup",
            lookup_id = %Uuid::new_v4(),
            project_id = %config.project_id(),
            environment = %config.environment_slug(),
            secret_path = %config.secret_path(),
        );

        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &LookupRequest) -> Result<LookupResult, LookupError> {
        let config = &request.config;

        debug!(state = %LookupState::Authenticating, base_url = %config.base_url(), "Lookup started");
        let token = match self
            .auth
            .authenticate(config.base_url(), config.client_id(), config.client_secret())
            .await
        {
            Ok(token) => token,
            Err(e) => {
                warn!(state = %LookupState::Failed, error = %e, "Authentication failed");
                return Err(LookupError::Authentication(e));
            }
        };

        let scope = SecretScope::from(config);
        debug!(state = %LookupState::Fetching, "Authenticated, listing secrets");
        let entries = match self.fetcher.list_secrets(&token, &scope).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(state = %LookupState::Failed, error = %e, "Secret listing failed");
                return Err(LookupError::Fetch(e));
            }
        };

        let listed = entries.len();
        let result = select_requested(entries, &request.keys);

        info!(
            state = %LookupState::Done,
            requested = request.keys.len(),
            listed,
            matched = result.len(),
            "Lookup completed"
        );

        Ok(result)
    }
}

/// Keep listed entries whose key was requested, preserving listing order
fn select_requested(entries: Vec<SecretEntry>, keys: &[String]) -> LookupResult {
    let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
    entries
        .into_iter()
        .filter(|entry| wanted.contains(entry.key.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeAuth {
        fail_with: Option<String>,
        calls: AtomicUsize,
    }

    impl FakeAuth {
        fn ok() -> Self {
            Self {
                fail_with: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AuthClient for FakeAuth {
        async fn authenticate(
            &self,
            base_url: &str,
            client_id: &SecretString,
            client_secret: &SecretString,
        ) -> Result<AccessToken, InfisicalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(client_id.expose_secret(), "client-id");
            assert_eq!(client_secret.expose_secret(), "client-secret");
            match &self.fail_with {
                Some(message) => Err(InfisicalError::Api {
                    status: 401,
                    message: message.clone(),
                }),
                None => Ok(AccessToken::new(base_url, "token-1")),
            }
        }
    }

    struct FakeFetcher {
        listing: Vec<(&'static str, &'static str)>,
        fail_with: Option<String>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn with(listing: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                listing,
                fail_with: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                listing: Vec::new(),
                fail_with: Some(message.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SecretFetcher for FakeFetcher {
        async fn list_secrets(
            &self,
            token: &AccessToken,
            scope: &SecretScope,
        ) -> Result<Vec<SecretEntry>, InfisicalError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(token.secret().expose_secret(), "token-1");
            assert_eq!(token.base_url(), "https://infisical.test");
            assert_eq!(scope.project_id, "project-id");
            assert_eq!(scope.environment_slug, "prod");
            assert_eq!(scope.secret_path, "/");
            match &self.fail_with {
                Some(message) => Err(InfisicalError::Api {
                    status: 404,
                    message: message.clone(),
                }),
                None => Ok(self
                    .listing
                    .iter()
                    .map(|(k, v)| SecretEntry::new(*k, *v))
                    .collect()),
            }
        }
    }

    fn request(keys: &[&str]) -> LookupRequest {
        LookupRequest::new(
            ConnectionConfig::new(
                "https://infisical.test",
                "client-id",
                "client-secret",
                "project-id",
                "prod",
            ),
            keys.iter().map(|k| k.to_string()).collect(),
        )
    }

    fn pairs(result: &LookupResult) -> Vec<(String, String)> {
        result
            .iter()
            .map(|e| (e.key.clone(), e.value.expose_secret().to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_keys_are_dropped() {
        let orchestrator = LookupOrchestrator::new(
            Arc::new(FakeAuth::ok()),
            Arc::new(FakeFetcher::with(vec![("DB_PASS", "x")])),
        );

        let result = orchestrator
            .lookup(&request(&["DB_PASS", "API_KEY"]))
            .await
            .unwrap();

        assert_eq!(pairs(&result), vec![("DB_PASS".to_string(), "x".to_string())]);
    }

    #[tokio::test]
    async fn test_result_follows_listing_order() {
        let orchestrator = LookupOrchestrator::new(
            Arc::new(FakeAuth::ok()),
            Arc::new(FakeFetcher::with(vec![
                ("A", "1"),
                ("UNWANTED", "0"),
                ("B", "2"),
                ("C", "3"),
            ])),
        );

        let result = orchestrator.lookup(&request(&["C", "A", "B"])).await.unwrap();
        let keys: Vec<_> = result.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_no_matches_is_success() {
        let orchestrator = LookupOrchestrator::new(
            Arc::new(FakeAuth::ok()),
            Arc::new(FakeFetcher::with(vec![("OTHER", "v")])),
        );

        let result = orchestrator.lookup(&request(&["DB_PASS"])).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_skips_fetch() {
        let auth = Arc::new(FakeAuth::failing("invalid client secret"));
        let fetcher = Arc::new(FakeFetcher::with(vec![("DB_PASS", "hunter2")]));
        let orchestrator = LookupOrchestrator::new(auth.clone(), fetcher.clone());

        let err = orchestrator.lookup(&request(&["DB_PASS"])).await.unwrap_err();
        let message = err.to_string();

        assert!(matches!(err, LookupError::Authentication(_)));
        assert!(message.starts_with("Failed to authenticate with Infisical: "));
        assert!(message.contains("invalid client secret"));
        assert!(!message.contains("hunter2"));
        assert!(!message.contains("client-secret"));
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let orchestrator = LookupOrchestrator::new(
            Arc::new(FakeAuth::ok()),
            Arc::new(FakeFetcher::failing("Folder with path '/' not found")),
        );

        let err = orchestrator.lookup(&request(&["DB_PASS"])).await.unwrap_err();
        assert!(matches!(err, LookupError::Fetch(_)));
        assert!(err
            .to_string()
            .starts_with("Failed to fetch secrets from Infisical: "));
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_repeated_lookup_is_identical() {
        let orchestrator = LookupOrchestrator::new(
            Arc::new(FakeAuth::ok()),
            Arc::new(FakeFetcher::with(vec![("A", "1"), ("B", "2")])),
        );
        let req = request(&["B", "A"]);

        let first = orchestrator.lookup(&req).await.unwrap();
        let second = orchestrator.lookup(&req).await.unwrap();
        assert_eq!(pairs(&first), pairs(&second));
    }

    #[test]
    fn test_entry_serializes_value_but_debug_redacts() {
        let entry = SecretEntry::new("DB_PASS", "hunter2");

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"key": "DB_PASS", "value": "hunter2"}));
        assert!(!format!("{:?}", entry).contains("hunter2"));
    }

    #[test]
    fn test_token_debug_redacts() {
        let token = AccessToken::new("https://infisical.test", "sensitive-token").with_expires_in(7200);
        assert_eq!(token.expires_in(), Some(7200));
        assert!(!format!("{:?}", token).contains("sensitive-token"));
    }
}
