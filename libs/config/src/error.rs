//! Configuration errors.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
///
/// Validation is fail-fast: the first unknown key, wrong type, or malformed
/// value aborts the load instead of surfacing later at point of use.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON or contains unknown/mistyped keys.
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value parsed but is not usable.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// An environment variable override is malformed.
    #[error("invalid environment variable '{var}': {reason}")]
    InvalidEnv { var: String, reason: String },
}

impl ConfigError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_env(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEnv {
            var: var.into(),
            reason: reason.into(),
        }
    }
}
