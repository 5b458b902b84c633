use thiserror::Error;

/// Errors raised while building or loading a schema.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Unknown field type '{type_name}' for field '{field}'")]
    UnknownType { field: String, type_name: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid schema JSON: {0}")]
    InvalidJson(String),

    #[error("Failed to read schema file: {0}")]
    Io(String),
}

impl SchemaError {
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }
}
