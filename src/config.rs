//! Infisical Connection Configuration
//!
//! Typed view of the six configuration properties a secret config carries,
//! plus the static field table shared by validation and metadata serving.

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::validation::{self, ValidationProblem};

pub const URL_KEY: &str = "InfisicalURL";
pub const CLIENT_ID_KEY: &str = "ClientId";
pub const CLIENT_SECRET_KEY: &str = "ClientSecret";
pub const PROJECT_ID_KEY: &str = "ProjectId";
pub const ENVIRONMENT_SLUG_KEY: &str = "EnvironmentSlug";
pub const SECRET_PATH_KEY: &str = "SecretPath";

/// Path used when `SecretPath` is absent or empty
pub const DEFAULT_SECRET_PATH: &str = "/";

/// Raw string-keyed configuration as sent by the plugin host
pub type RawConfig = BTreeMap<String, String>;

/// Property map as it appears on the wire, where any value may be `null`
pub type NullableConfig = BTreeMap<String, Option<String>>;

/// Drop `null` properties so they read as absent
pub fn without_nulls(fields: NullableConfig) -> RawConfig {
    fields
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect()
}

/// Deserialize a host property map, treating `null` values (or a `null`
/// map) as absent
pub fn deserialize_raw_config<'de, D>(deserializer: D) -> Result<RawConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let fields = Option::<NullableConfig>::deserialize(deserializer)?;
    Ok(without_nulls(fields.unwrap_or_default()))
}

/// Declarative description of one configuration property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigField {
    /// Property key as it appears on the wire
    pub key: &'static str,
    /// Human-readable label used in forms and validation messages
    pub label: &'static str,
    /// Must be present and non-empty
    pub required: bool,
    /// Rendered masked by the host and never logged
    pub secure: bool,
}

impl ConfigField {
    const fn new(key: &'static str, label: &'static str, required: bool, secure: bool) -> Self {
        Self {
            key,
            label,
            required,
            secure,
        }
    }
}

/// Every property the connection config recognizes, in display order.
pub const CONFIG_FIELDS: [ConfigField; 6] = [
    ConfigField::new(URL_KEY, "Infisical URL", true, false),
    ConfigField::new(CLIENT_ID_KEY, "Universal Auth Client ID", true, true),
    ConfigField::new(CLIENT_SECRET_KEY, "Universal Auth Client Secret", true, true),
    ConfigField::new(PROJECT_ID_KEY, "Project ID", true, false),
    ConfigField::new(ENVIRONMENT_SLUG_KEY, "Environment Slug", true, false),
    ConfigField::new(SECRET_PATH_KEY, "Secret Path", false, false),
];

/// Look up the field description for a property key
pub fn field(key: &str) -> Option<&'static ConfigField> {
    CONFIG_FIELDS.iter().find(|f| f.key == key)
}

/// Configuration rejected before any network call was attempted
#[derive(Debug, Error)]
#[error("{}", describe(.0))]
pub struct ConfigError(pub Vec<ValidationProblem>);

fn describe(problems: &[ValidationProblem]) -> String {
    problems
        .iter()
        .map(|p| format!("{}: {}", p.key, p.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Connection parameters for one Infisical project scope.
///
/// Client credentials are held redacted; `Debug` never prints them.
#[derive(Debug)]
pub struct ConnectionConfig {
    base_url: String,
    client_id: SecretString,
    client_secret: SecretString,
    project_id: String,
    environment_slug: String,
    secret_path: Option<String>,
}

impl ConnectionConfig {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        project_id: impl Into<String>,
        environment_slug: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: SecretString::from(client_id.into()),
            client_secret: SecretString::from(client_secret.into()),
            project_id: project_id.into(),
            environment_slug: environment_slug.into(),
            secret_path: None,
        }
    }

    /// Set the folder path secrets are listed from
    pub fn with_secret_path(mut self, secret_path: impl Into<String>) -> Self {
        self.secret_path = Some(secret_path.into());
        self
    }

    /// Build a config from raw host properties.
    ///
    /// Fails with every required-field problem when any required property is
    /// absent or empty. Unknown keys are ignored here.
    pub fn from_fields(fields: &RawConfig) -> Result<Self, ConfigError> {
        let problems = validation::validate(fields);
        if !problems.is_empty() {
            return Err(ConfigError(problems));
        }

        let get = |key: &str| fields.get(key).cloned().unwrap_or_default();

        let mut config = Self::new(
            get(URL_KEY),
            get(CLIENT_ID_KEY),
            get(CLIENT_SECRET_KEY),
            get(PROJECT_ID_KEY),
            get(ENVIRONMENT_SLUG_KEY),
        );
        config.secret_path = fields.get(SECRET_PATH_KEY).cloned();
        Ok(config)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client_id(&self) -> &SecretString {
        &self.client_id
    }

    pub fn client_secret(&self) -> &SecretString {
        &self.client_secret
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn environment_slug(&self) -> &str {
        &self.environment_slug
    }

    /// Resolved secret path, `/` when unset or empty
    pub fn secret_path(&self) -> &str {
        match self.secret_path.as_deref() {
            Some(path) if !path.is_empty() => path,
            _ => DEFAULT_SECRET_PATH,
        }
    }
}
