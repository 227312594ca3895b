//! Infisical API Types
//!
//! Request and response bodies for the Universal Auth login and raw secret
//! listing endpoints, plus the client error type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors talking to an Infisical instance.
///
/// Messages carry what the server said, never request credentials.
#[derive(Debug, Error)]
pub enum InfisicalError {
    #[error("network error calling {endpoint}: {source}")]
    Network {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl InfisicalError {
    /// HTTP status for API errors
    pub fn status(&self) -> Option<u16> {
        match self {
            InfisicalError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Universal Auth login body. No `Debug`: it holds the raw client secret.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UniversalAuthLoginRequest<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UniversalAuthLoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Error body Infisical returns on 4xx/5xx
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/v3/secrets/raw` response
#[derive(Deserialize, Default)]
pub(crate) struct ListSecretsResponse {
    #[serde(default)]
    pub secrets: Vec<RawSecret>,
    #[serde(default)]
    pub imports: Vec<SecretImport>,
}

/// Secret as listed by the server. No `Debug`: it holds the value.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSecret {
    pub secret_key: String,
    #[serde(default)]
    pub secret_value: String,
    #[serde(rename = "type", default)]
    pub secret_type: Option<String>,
}

impl RawSecret {
    pub fn is_personal(&self) -> bool {
        self.secret_type.as_deref() == Some("personal")
    }
}

/// Secrets pulled in from another folder or environment
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SecretImport {
    #[serde(default)]
    pub secret_path: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub secrets: Vec<RawSecret>,
}
