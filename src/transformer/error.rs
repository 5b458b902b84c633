//! Error handling for the transformer.

use thiserror::Error;

use crate::schema::SchemaError;
use crate::script::ScriptError;

/// Result type for transformer operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Error type for transformer operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    /// The script failed to compile or could not be loaded into a context.
    #[error("Failed to load script: {0}")]
    ScriptLoad(ScriptError),

    /// The script's entry point failed.
    #[error("Script execution failed: {0}")]
    ScriptRuntime(ScriptError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        config_key: Option<String>,
    },

    /// Schema-related errors
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
}

impl TransformError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: None,
        }
    }

    /// Creates a configuration error tied to one setting.
    pub fn configuration_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            config_key: Some(key.into()),
        }
    }

    /// The underlying script error, if any.
    pub fn script_error(&self) -> Option<&ScriptError> {
        match self {
            Self::ScriptLoad(error) | Self::ScriptRuntime(error) => Some(error),
            _ => None,
        }
    }
}
