use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Rule '{rule}' is not configured: at least one value is required")]
    RuleNotConfigured { rule: String },

    #[error("Unknown rule '{0}'")]
    UnknownRule(String),

    #[error("Invalid parameter for rule '{rule}': {reason}")]
    InvalidRuleParameter { rule: String, reason: String },

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Security permission fault: {0}")]
    SecurityPermission(String),

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GateError {
    /// Fatal faults mean the surrounding integration is miswired; they are never
    /// turned into a per-request rejection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, GateError::SecurityPermission(_))
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
