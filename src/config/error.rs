//! Configuration error types

use thiserror::Error;

pub type ConfigResult<T> = std::result::Result<T, ConfigurationError>;

#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// File could not be read or values could not be deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Missing configuration value: {field}")]
    MissingValue { field: String },

    #[error("Invalid configuration value for {field} ({value}): {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigurationError {
    pub fn missing_value(field: impl Into<String>) -> Self {
        Self::MissingValue {
            field: field.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}
