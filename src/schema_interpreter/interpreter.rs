use log::debug;
use std::path::Path;

use crate::schema::types::{FieldDefinition, FieldType, Schema, SchemaError};
use crate::schema_interpreter::types::{
    JsonSchemaDefinition, JsonSchemaField, JsonSubtype, JsonTypeName,
};
use crate::schema_interpreter::validator::SchemaValidator;

/// Interprets JSON schema definitions and converts them to [`Schema`]s.
#[derive(Default)]
pub struct SchemaInterpreter;

impl SchemaInterpreter {
    /// Creates a new schema interpreter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Interprets a JSON schema definition and converts it to a [`Schema`].
    ///
    /// # Errors
    /// Returns a `SchemaError` if validation fails.
    pub fn interpret(
        &self,
        json_schema: JsonSchemaDefinition,
    ) -> crate::schema_interpreter::Result<Schema> {
        SchemaValidator::validate(&json_schema)?;
        let schema = Self::convert_fields(json_schema)?;
        debug!("Interpreted schema with {} top-level fields", schema.len());
        Ok(schema)
    }

    fn convert_fields(json_schema: JsonSchemaDefinition) -> crate::schema_interpreter::Result<Schema> {
        let mut schema = Schema::new();
        for (field_name, json_field) in json_schema.fields {
            let definition = Self::convert_field(&field_name, json_field)?;
            schema.add_field(field_name, definition);
        }
        Ok(schema)
    }

    /// Converts a JSON field to a [`FieldDefinition`].
    fn convert_field(
        field_name: &str,
        json_field: JsonSchemaField,
    ) -> crate::schema_interpreter::Result<FieldDefinition> {
        let type_name = JsonTypeName::parse(&json_field.type_name).ok_or_else(|| {
            SchemaError::UnknownType {
                field: field_name.to_string(),
                type_name: json_field.type_name.clone(),
            }
        })?;

        let field_type = match type_name {
            JsonTypeName::Array => {
                let element = Self::convert_element(field_name, &json_field)?;
                FieldType::Array {
                    element: Some(Box::new(element)),
                }
            }
            other => Self::scalar_or_map(other, &json_field)?,
        };

        Ok(FieldDefinition {
            field_type,
            not_null: json_field.not_null,
        })
    }

    /// Element definition of an array field. A bare subtype name borrows the
    /// array's own `precision` and `fields`.
    fn convert_element(
        field_name: &str,
        json_field: &JsonSchemaField,
    ) -> crate::schema_interpreter::Result<FieldDefinition> {
        match &json_field.subtype {
            Some(JsonSubtype::Definition(definition)) => {
                Self::convert_field(field_name, definition.as_ref().clone())
            }
            Some(JsonSubtype::Name(name)) => {
                let element = JsonTypeName::parse(name)
                    .filter(|element| *element != JsonTypeName::Array)
                    .ok_or_else(|| {
                        SchemaError::invalid_field(field_name, format!("Invalid array subtype '{name}'"))
                    })?;
                Ok(FieldDefinition::new(Self::scalar_or_map(element, json_field)?))
            }
            None => Err(SchemaError::invalid_field(
                field_name,
                "Array fields require a subtype",
            )),
        }
    }

    fn scalar_or_map(
        type_name: JsonTypeName,
        json_field: &JsonSchemaField,
    ) -> crate::schema_interpreter::Result<FieldType> {
        Ok(match type_name {
            JsonTypeName::Int => FieldType::Int64,
            JsonTypeName::UInt => FieldType::UInt64,
            JsonTypeName::Float => FieldType::Float64,
            JsonTypeName::Bool => FieldType::Bool,
            JsonTypeName::String => FieldType::String,
            JsonTypeName::Binary => FieldType::Binary,
            JsonTypeName::Any => FieldType::Any,
            JsonTypeName::Time => FieldType::Time {
                precision: json_field.precision.unwrap_or_default(),
            },
            JsonTypeName::Map => FieldType::Map {
                fields: json_field
                    .fields
                    .clone()
                    .map(Self::convert_fields)
                    .transpose()?,
            },
            JsonTypeName::Array => FieldType::Array { element: None },
        })
    }

    /// Interprets a JSON schema from a string.
    ///
    /// # Errors
    /// Returns a `SchemaError` if the JSON is malformed or validation fails.
    pub fn interpret_str(&self, json_str: &str) -> crate::schema_interpreter::Result<Schema> {
        let json_schema: JsonSchemaDefinition = serde_json::from_str(json_str)
            .map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
        self.interpret(json_schema)
    }

    /// Interprets a JSON schema from a file.
    ///
    /// # Errors
    /// Returns a `SchemaError` if the file cannot be read, holds invalid
    /// JSON, or fails validation.
    pub fn interpret_file(&self, path: impl AsRef<Path>) -> crate::schema_interpreter::Result<Schema> {
        let path = path.as_ref();
        debug!("Loading schema from {}", path.display());
        let json_str = std::fs::read_to_string(path)
            .map_err(|e| SchemaError::Io(format!("{}: {e}", path.display())))?;
        self.interpret_str(&json_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::TimePrecision;

    #[test]
    fn test_interpret_scalars_and_aliases() {
        let schema = SchemaInterpreter::new()
            .interpret_str(
                r#"{
                    "id": { "type": "uint64", "notNull": true },
                    "flag": { "type": "boolean" },
                    "blob": { "type": "bytes" },
                    "at": { "type": "time", "precision": "second" }
                }"#,
            )
            .unwrap();

        assert_eq!(schema.field("id"), Some(&FieldDefinition::uint().not_null()));
        assert_eq!(schema.field("flag"), Some(&FieldDefinition::boolean()));
        assert_eq!(schema.field("blob"), Some(&FieldDefinition::binary()));
        assert_eq!(
            schema.field("at"),
            Some(&FieldDefinition::time(TimePrecision::Second))
        );
    }

    #[test]
    fn test_array_of_maps_uses_array_level_fields() {
        let schema = SchemaInterpreter::new()
            .interpret_str(
                r#"{ "items": { "type": "array", "subtype": "map", "fields": {
                        "sku": { "type": "string" } } } }"#,
            )
            .unwrap();

        let element = Schema::new().with_field("sku", FieldDefinition::string());
        assert_eq!(
            schema.field("items"),
            Some(&FieldDefinition::array(FieldDefinition::map(element)))
        );
    }

    #[test]
    fn test_nested_array_definition() {
        let schema = SchemaInterpreter::new()
            .interpret_str(
                r#"{ "grid": { "type": "array", "subtype": { "type": "array", "subtype": "int" } } }"#,
            )
            .unwrap();

        assert_eq!(
            schema.field("grid"),
            Some(&FieldDefinition::array(FieldDefinition::array(
                FieldDefinition::int()
            )))
        );
    }

    #[test]
    fn test_time_precision_defaults_to_nanosecond() {
        let schema = SchemaInterpreter::new()
            .interpret_str(r#"{ "at": { "type": "time" } }"#)
            .unwrap();
        assert_eq!(
            schema.field("at"),
            Some(&FieldDefinition::time(TimePrecision::Nanosecond))
        );
    }

    #[test]
    fn test_interpret_invalid_json() {
        let result = SchemaInterpreter::new().interpret_str("invalid json");
        assert!(matches!(result, Err(SchemaError::InvalidJson(_))));
    }

    #[test]
    fn test_interpret_missing_file() {
        let result = SchemaInterpreter::new().interpret_file("/nonexistent/schema.json");
        assert!(matches!(result, Err(SchemaError::Io(_))));
    }
}
