//! Infisical HTTP Client
//!
//! Production implementation of [`AuthClient`] and [`SecretFetcher`] over
//! the Infisical REST API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::types::{
    ApiErrorBody, InfisicalError, ListSecretsResponse, UniversalAuthLoginRequest,
    UniversalAuthLoginResponse,
};
use crate::lookup::{AccessToken, AuthClient, SecretEntry, SecretFetcher, SecretScope};
use crate::settings::HttpSettings;

const LOGIN_PATH: &str = "/api/v1/auth/universal-auth/login";
const LIST_SECRETS_PATH: &str = "/api/v3/secrets/raw";

/// Infisical REST client. Holds no credentials or tokens between calls.
#[derive(Debug, Clone)]
pub struct InfisicalClient {
    http_client: Client,
}

impl InfisicalClient {
    /// Create a client with the configured timeouts
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let http_client = settings
            .build_client()
            .context("Failed to create HTTP client")?;

        Ok(Self { http_client })
    }

    pub fn with_http_client(http_client: Client) -> Self {
        Self { http_client }
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Turn a non-success response into an API error carrying the server message
async fn api_error(response: Response) -> InfisicalError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<ApiErrorBody>(&text)
        .ok()
        .and_then(|body| body.message.or(body.error))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                trimmed.to_string()
            }
        });

    InfisicalError::Api {
        status: status.as_u16(),
        message,
    }
}

/// Flatten a listing into key/value entries.
///
/// A personal secret replaces the shared secret of the same key, at the
/// shared secret's position wherever the two appear in the listing.
/// Imported secrets follow direct ones and never shadow a key already seen.
pub(crate) fn merge_listing(listing: ListSecretsResponse) -> Vec<SecretEntry> {
    let mut overrides: HashMap<String, String> = HashMap::new();
    let mut shared: HashSet<String> = HashSet::new();
    for secret in &listing.secrets {
        if secret.is_personal() {
            overrides
                .entry(secret.secret_key.clone())
                .or_insert_with(|| secret.secret_value.clone());
        } else {
            shared.insert(secret.secret_key.clone());
        }
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<SecretEntry> = Vec::with_capacity(listing.secrets.len());

    for secret in listing.secrets {
        if secret.is_personal() && shared.contains(&secret.secret_key) {
            continue;
        }
        if !seen.insert(secret.secret_key.clone()) {
            continue;
        }
        let value = overrides
            .remove(&secret.secret_key)
            .unwrap_or(secret.secret_value);
        merged.push(SecretEntry::new(secret.secret_key, value));
    }

    for import in listing.imports {
        debug!(
            environment = import.environment.as_deref().unwrap_or("-"),
            secret_path = import.secret_path.as_deref().unwrap_or("-"),
            count = import.secrets.len(),
            "Merging imported secrets"
        );
        for secret in import.secrets {
            if seen.insert(secret.secret_key.clone()) {
                merged.push(SecretEntry::new(secret.secret_key, secret.secret_value));
            }
        }
    }

    merged
}

#[async_trait]
impl AuthClient for InfisicalClient {
    async fn authenticate(
        &self,
        base_url: &str,
        client_id: &SecretString,
        client_secret: &SecretString,
    ) -> Result<AccessToken, InfisicalError> {
        let url = endpoint(base_url, LOGIN_PATH);
        debug!(url = %url, "Requesting Universal Auth access token");

        let body = UniversalAuthLoginRequest {
            client_id: client_id.expose_secret(),
            client_secret: client_secret.expose_secret(),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| InfisicalError::Network {
                endpoint: LOGIN_PATH,
                source: e.without_url(),
            })?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let login: UniversalAuthLoginResponse =
            response.json().await.map_err(|e| InfisicalError::Decode {
                endpoint: LOGIN_PATH,
                source: e.without_url(),
            })?;

        let mut token = AccessToken::new(base_url.trim_end_matches('/'), login.access_token);
        if let Some(expires_in) = login.expires_in {
            token = token.with_expires_in(expires_in);
        }

        debug!(expires_in = ?token.expires_in(), "Access token issued");
        Ok(token)
    }
}

#[async_trait]
impl SecretFetcher for InfisicalClient {
    async fn list_secrets(
        &self,
        token: &AccessToken,
        scope: &SecretScope,
    ) -> Result<Vec<SecretEntry>, InfisicalError> {
        let url = endpoint(token.base_url(), LIST_SECRETS_PATH);
        debug!(url = %url, "Listing secrets");

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(token.secret().expose_secret())
            .query(&[
                ("workspaceId", scope.project_id.as_str()),
                ("environment", scope.environment_slug.as_str()),
                ("secretPath", scope.secret_path.as_str()),
                ("expandSecretReferences", "true"),
                ("include_imports", "true"),
            ])
            .send()
            .await
            .map_err(|e| InfisicalError::Network {
                endpoint: LIST_SECRETS_PATH,
                source: e.without_url(),
            })?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let listing: ListSecretsResponse =
            response.json().await.map_err(|e| InfisicalError::Decode {
                endpoint: LIST_SECRETS_PATH,
                source: e.without_url(),
            })?;

        let entries = merge_listing(listing);
        debug!(count = entries.len(), "Secrets listed");
        Ok(entries)
    }
}
