use crate::schema::types::SchemaError;
use crate::schema_interpreter::types::{
    JsonSchemaDefinition, JsonSchemaField, JsonSubtype, JsonTypeName,
};

pub struct SchemaValidator;

impl SchemaValidator {
    /// Validates a JSON schema definition.
    ///
    /// # Errors
    /// Returns a `SchemaError` if:
    /// - A field name is empty
    /// - A type or array subtype name is unknown
    /// - An array field has no subtype
    /// - `fields` appears on something other than a map or an array of maps
    pub fn validate(schema: &JsonSchemaDefinition) -> crate::schema_interpreter::Result<()> {
        Self::validate_fields(schema, "")
    }

    fn validate_fields(
        schema: &JsonSchemaDefinition,
        prefix: &str,
    ) -> crate::schema_interpreter::Result<()> {
        for (field_name, field) in &schema.fields {
            if field_name.is_empty() {
                return Err(SchemaError::invalid_field(
                    prefix,
                    "Field name cannot be empty",
                ));
            }
            let path = if prefix.is_empty() {
                field_name.clone()
            } else {
                format!("{prefix}.{field_name}")
            };
            Self::validate_field(field, &path)?;
        }
        Ok(())
    }

    fn validate_field(field: &JsonSchemaField, path: &str) -> crate::schema_interpreter::Result<()> {
        let type_name = Self::type_name(&field.type_name, path)?;

        match type_name {
            JsonTypeName::Map => {
                if let Some(fields) = &field.fields {
                    Self::validate_fields(fields, path)?;
                }
            }
            JsonTypeName::Array => Self::validate_subtype(field, path)?,
            _ => {
                if field.fields.is_some() {
                    return Err(SchemaError::invalid_field(
                        path,
                        "'fields' is only allowed on map fields and arrays of maps",
                    ));
                }
            }
        }

        if field.subtype.is_some() && type_name != JsonTypeName::Array {
            return Err(SchemaError::invalid_field(
                path,
                "'subtype' is only allowed on array fields",
            ));
        }

        Ok(())
    }

    fn validate_subtype(field: &JsonSchemaField, path: &str) -> crate::schema_interpreter::Result<()> {
        let element_path = format!("{path}[]");

        match &field.subtype {
            None => Err(SchemaError::invalid_field(
                path,
                "Array fields require a subtype",
            )),
            Some(JsonSubtype::Name(name)) => {
                let element = Self::subtype_name(name, path)?;
                match element {
                    JsonTypeName::Map => {
                        if let Some(fields) = &field.fields {
                            Self::validate_fields(fields, &element_path)?;
                        }
                        Ok(())
                    }
                    _ if field.fields.is_some() => Err(SchemaError::invalid_field(
                        path,
                        "'fields' on an array requires subtype 'map'",
                    )),
                    _ => Ok(()),
                }
            }
            Some(JsonSubtype::Definition(definition)) => {
                if field.fields.is_some() {
                    return Err(SchemaError::invalid_field(
                        path,
                        "'fields' belongs inside the subtype definition",
                    ));
                }
                Self::validate_field(definition, &element_path)
            }
        }
    }

    fn type_name(name: &str, path: &str) -> crate::schema_interpreter::Result<JsonTypeName> {
        JsonTypeName::parse(name).ok_or_else(|| SchemaError::UnknownType {
            field: path.to_string(),
            type_name: name.to_string(),
        })
    }

    /// Bare subtype names cannot describe nested arrays; those need a full
    /// definition.
    fn subtype_name(name: &str, path: &str) -> crate::schema_interpreter::Result<JsonTypeName> {
        match JsonTypeName::parse(name) {
            Some(JsonTypeName::Array) => Err(SchemaError::invalid_field(
                path,
                "Nested arrays need a subtype definition object",
            )),
            Some(element) => Ok(element),
            None => Err(SchemaError::invalid_field(
                path,
                format!("Invalid array subtype '{name}'"),
            )),
        }
    }
}
