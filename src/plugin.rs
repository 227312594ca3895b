//! Secrets Plugin Adapter
//!
//! Maps the host's five secrets-extension requests onto the config model,
//! validator and lookup orchestrator, and shapes the JSON the host expects.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{self, ConnectionConfig, NullableConfig, RawConfig, CONFIG_FIELDS};
use crate::lookup::{LookupError, LookupOrchestrator, LookupRequest};
use crate::validation::{self, ValidationProblem};

/// Extension this plugin implements
pub const EXTENSION: &str = "secrets";
/// Extension API versions this plugin speaks
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

pub const ICON_CONTENT_TYPE: &str = "image/svg+xml";
const ICON: &[u8] = include_bytes!("../assets/plugin-icon.svg");
const CONFIG_VIEW_TEMPLATE: &str = include_str!("../assets/secrets.template.html");

/// Requests the host may send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    GetIcon,
    GetMetadata,
    GetView,
    Validate,
    Lookup,
}

impl RequestKind {
    pub const ALL: [RequestKind; 5] = [
        RequestKind::GetIcon,
        RequestKind::GetMetadata,
        RequestKind::GetView,
        RequestKind::Validate,
        RequestKind::Lookup,
    ];

    /// Wire name of the request
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::GetIcon => "go.cd.secrets.get-icon",
            RequestKind::GetMetadata => "go.cd.secrets.secrets-config.get-metadata",
            RequestKind::GetView => "go.cd.secrets.secrets-config.get-view",
            RequestKind::Validate => "go.cd.secrets.secrets-config.validate",
            RequestKind::Lookup => "go.cd.secrets.secrets-lookup",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RequestKind {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RequestKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| PluginError::UnhandledRequestType(s.to_string()))
    }
}

/// Faults the host must translate into a transport-level error
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Unhandled request type: {0}")]
    UnhandledRequestType(String),

    #[error("Malformed request body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("Failed to encode response: {0}")]
    EncodeResponse(#[source] serde_json::Error),
}

/// Status and JSON body handed back to the host
#[derive(Debug, Clone, PartialEq)]
pub struct PluginResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl PluginResponse {
    pub const SUCCESS: u16 = 200;
    pub const ERROR: u16 = 500;

    fn success(body: impl Serialize) -> Result<Self, PluginError> {
        Ok(Self {
            status: Self::SUCCESS,
            body: serde_json::to_value(body).map_err(PluginError::EncodeResponse)?,
        })
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: Self::ERROR,
            body: serde_json::json!({ "message": message.into() }),
        }
    }
}

/// One entry of the get-metadata response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub key: String,
    pub metadata: PropertyMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMetadata {
    pub required: bool,
    pub secure: bool,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ViewResponse {
    pub template: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct IconResponse {
    pub content_type: &'static str,
    pub data: String,
}

/// Lookup request as the host sends it
#[derive(Debug, Deserialize)]
pub struct LookupRequestBody {
    #[serde(default, deserialize_with = "config::deserialize_raw_config")]
    pub configuration: RawConfig,
    #[serde(default)]
    pub keys: Vec<String>,
}

impl TryFrom<LookupRequestBody> for LookupRequest {
    type Error = LookupError;

    fn try_from(body: LookupRequestBody) -> Result<Self, Self::Error> {
        let config = ConnectionConfig::from_fields(&body.configuration)?;
        Ok(LookupRequest::new(config, body.keys))
    }
}

/// Metadata for every recognized property, in field table order
pub fn metadata() -> Vec<MetadataEntry> {
    CONFIG_FIELDS
        .iter()
        .map(|f| MetadataEntry {
            key: f.key.to_string(),
            metadata: PropertyMetadata {
                required: f.required,
                secure: f.secure,
                display_name: f.label.to_string(),
            },
        })
        .collect()
}

pub fn view() -> ViewResponse {
    ViewResponse {
        template: CONFIG_VIEW_TEMPLATE,
    }
}

pub fn icon() -> IconResponse {
    IconResponse {
        content_type: ICON_CONTENT_TYPE,
        data: STANDARD.encode(ICON),
    }
}

/// Parse a JSON body, treating an empty body as an empty object
fn parse_body<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, serde_json::Error> {
    if body.trim().is_empty() {
        serde_json::from_str("{}")
    } else {
        serde_json::from_str(body)
    }
}

/// Request dispatcher for the secrets extension
#[derive(Clone)]
pub struct SecretsPlugin {
    orchestrator: LookupOrchestrator,
}

impl SecretsPlugin {
    pub fn new(orchestrator: LookupOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Route one host request by name
    pub async fn handle(&self, request_name: &str, body: &str) -> Result<PluginResponse, PluginError> {
        let kind: RequestKind = request_name.parse()?;
        debug!(request = %kind, "Handling plugin request");

        match kind {
            RequestKind::GetIcon => PluginResponse::success(icon()),
            RequestKind::GetMetadata => PluginResponse::success(metadata()),
            RequestKind::GetView => PluginResponse::success(view()),
            RequestKind::Validate => PluginResponse::success(self.validate(body)?),
            RequestKind::Lookup => self.lookup(body).await,
        }
    }

    /// Validate a raw property map; problems are a normal response
    pub fn validate(&self, body: &str) -> Result<Vec<ValidationProblem>, PluginError> {
        let fields: NullableConfig = parse_body(body)?;
        let fields = config::without_nulls(fields);
        let problems = validation::validate_all(&fields);

        if problems.is_empty() {
            debug!("Secret config is valid");
        } else {
            info!(problems = problems.len(), "Secret config has validation problems");
        }

        Ok(problems)
    }

    async fn lookup(&self, body: &str) -> Result<PluginResponse, PluginError> {
        let body: LookupRequestBody = parse_body(body)?;

        let request = match LookupRequest::try_from(body) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Rejecting lookup with incomplete configuration");
                return Ok(PluginResponse::error(e.to_string()));
            }
        };

        match self.orchestrator.lookup(&request).await {
            Ok(result) => PluginResponse::success(result),
            Err(e) => Ok(PluginResponse::error(e.to_string())),
        }
    }
}
