//! Schema interpreter for the JSON schema format.
//!
//! A schema document is a JSON object mapping field names to definitions:
//!
//! ```json
//! { "id":    { "type": "uint", "notNull": true },
//!   "items": { "type": "array", "subtype": "map", "fields": { "sku": { "type": "string" } } },
//!   "grid":  { "type": "array", "subtype": { "type": "array", "subtype": "int" } } }
//! ```

mod interpreter;
mod types;
mod validator;

pub use interpreter::SchemaInterpreter;
pub use types::{JsonSchemaDefinition, JsonSchemaField, JsonSubtype, JsonTypeName};

use crate::schema::types::SchemaError;

/// Result type for schema interpretation operations
pub type Result<T> = std::result::Result<T, SchemaError>;
