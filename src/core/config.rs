//! Gate settings
//!
//! Settings are read from TOML:
//!
//! ```toml
//! enabled = true
//! forbidden_response = "Forbidden by indexgate"
//!
//! [[users]]
//! name = "admin"
//! auth_key = "admin:secret"
//!
//! [[access_control_rules]]
//! name = "log readers"
//! type = "allow"
//! auth_key = "reader:pass"
//! indices = ["logs-*", "<no-index>"]
//! ```
//!
//! Every key of an `access_control_rules` entry other than `name` and `type` declares
//! a rule. Rules run in the order they are written.

use crate::acl::{BlockDescriptor, Policy};
use crate::error::{GateError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

fn default_enabled() -> bool {
    true
}

fn default_forbidden_response() -> String {
    "Forbidden".to_string()
}

/// Top-level settings document
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Settings {
    /// When false every request passes untouched
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Message placed in the `error_message` field of rejections
    #[serde(default = "default_forbidden_response")]
    #[validate(length(min = 1))]
    pub forbidden_response: String,

    /// Users accepted by the credential pre-filter
    #[serde(default)]
    #[validate(nested)]
    pub users: Vec<UserSettings>,

    /// Blocks in evaluation order
    #[serde(default)]
    #[validate(nested)]
    pub access_control_rules: Vec<BlockSettings>,
}

/// A user known to the credential pre-filter
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UserSettings {
    #[validate(length(min = 1))]
    pub name: String,

    /// `user:password` in clear text
    pub auth_key: String,
}

/// One block as written in the settings file
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BlockSettings {
    #[validate(length(min = 1))]
    pub name: String,

    #[serde(rename = "type", default)]
    pub policy: Policy,

    /// Rule key to parameter value(s), in declaration order
    #[serde(flatten)]
    pub rules: toml::Table,
}

impl Settings {
    /// Parse and validate a TOML settings document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Turn the configured blocks into descriptors for `Acl::build`
    ///
    /// # Errors
    ///
    /// `InvalidRuleParameter` if a rule value is neither a string nor an array of
    /// strings.
    pub fn block_descriptors(&self) -> Result<Vec<BlockDescriptor>> {
        self.access_control_rules
            .iter()
            .map(|block| {
                let rules = block
                    .rules
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), rule_params(key, value)?)))
                    .collect::<Result<Vec<_>>>()?;

                Ok(BlockDescriptor {
                    name: block.name.clone(),
                    policy: block.policy,
                    rules,
                })
            })
            .collect()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enabled: default_enabled(),
            forbidden_response: default_forbidden_response(),
            users: Vec::new(),
            access_control_rules: Vec::new(),
        }
    }
}

/// Rule values: a single string or an array of strings
fn rule_params(rule: &str, value: &toml::Value) -> Result<Vec<String>> {
    let invalid = |reason: String| GateError::InvalidRuleParameter {
        rule: rule.to_string(),
        reason,
    };

    match value {
        toml::Value::String(s) => Ok(vec![s.clone()]),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                toml::Value::String(s) => Ok(s.clone()),
                other => Err(invalid(format!("expected a string, found {}", other.type_str()))),
            })
            .collect(),
        other => Err(invalid(format!(
            "expected a string or an array of strings, found {}",
            other.type_str()
        ))),
    }
}
