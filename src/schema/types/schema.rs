use std::collections::HashMap;

use super::fields::FieldDefinition;

/// Field name to definition. Built once, then shared read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub fields: HashMap<String, FieldDefinition>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, field_name: impl Into<String>, definition: FieldDefinition) {
        self.fields.insert(field_name.into(), definition);
    }

    #[must_use]
    pub fn with_field(mut self, field_name: impl Into<String>, definition: FieldDefinition) -> Self {
        self.add_field(field_name, definition);
        self
    }

    pub fn field(&self, field_name: &str) -> Option<&FieldDefinition> {
        self.fields.get(field_name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
