//! Secret Config Validation
//!
//! Pure checks over the raw property map a host submits. Problems are data,
//! not errors: an invalid config still gets a normal response.

use serde::{Deserialize, Serialize};

use crate::config::{RawConfig, CONFIG_FIELDS};

/// Message reported for keys outside the recognized property set
pub const UNKNOWN_PROPERTY_MESSAGE: &str = "Is an unknown property";

/// A field-scoped validation problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationProblem {
    pub key: String,
    pub message: String,
}

impl ValidationProblem {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Report every required property that is absent or empty.
///
/// Problems follow the field table order. `SecretPath` is optional and
/// never reported; unknown keys are left to [`unknown_properties`].
pub fn validate(fields: &RawConfig) -> Vec<ValidationProblem> {
    CONFIG_FIELDS
        .iter()
        .filter(|f| f.required)
        .filter(|f| fields.get(f.key).map_or(true, |v| v.is_empty()))
        .map(|f| ValidationProblem::new(f.key, format!("{} is required.", f.label)))
        .collect()
}

/// Report every key the connection config does not recognize
pub fn unknown_properties(fields: &RawConfig) -> Vec<ValidationProblem> {
    fields
        .keys()
        .filter(|key| crate::config::field(key).is_none())
        .map(|key| ValidationProblem::new(key.as_str(), UNKNOWN_PROPERTY_MESSAGE))
        .collect()
}

/// Full host-facing validation: unknown keys first, then missing fields
pub fn validate_all(fields: &RawConfig) -> Vec<ValidationProblem> {
    let mut problems = unknown_properties(fields);
    problems.extend(validate(fields));
    problems
}
