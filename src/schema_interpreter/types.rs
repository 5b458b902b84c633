use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::schema::types::TimePrecision;

/// A schema document: field name to field definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonSchemaDefinition {
    pub fields: HashMap<String, JsonSchemaField>,
}

/// One field as written in a schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSchemaField {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<TimePrecision>,
    /// Element type of an `array` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<JsonSubtype>,
    /// Nested fields of a `map` field, or of the elements of an array whose
    /// subtype is `"map"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<JsonSchemaDefinition>,
}

/// Array element type: a bare type name or a full field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonSubtype {
    Name(String),
    Definition(Box<JsonSchemaField>),
}

/// Type names accepted in schema documents, aliases included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonTypeName {
    Int,
    UInt,
    Float,
    Bool,
    String,
    Binary,
    Time,
    Map,
    Array,
    Any,
}

impl JsonTypeName {
    pub fn parse(name: &str) -> Option<Self> {
        let parsed = match name {
            "int" | "int64" => Self::Int,
            "uint" | "uint64" => Self::UInt,
            "float" | "float64" => Self::Float,
            "bool" | "boolean" => Self::Bool,
            "string" => Self::String,
            "binary" | "bytes" => Self::Binary,
            "time" => Self::Time,
            "map" => Self::Map,
            "array" => Self::Array,
            "any" => Self::Any,
            _ => return None,
        };
        Some(parsed)
    }
}
