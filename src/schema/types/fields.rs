use serde::{Deserialize, Serialize};

use super::schema::Schema;

/// Resolution at which a `time` field is staged for scripts.
///
/// Anything coarser than [`TimePrecision::Nanosecond`] is handed to the
/// script engine as a native date built from epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePrecision {
    Second,
    Millisecond,
    Microsecond,
    #[default]
    Nanosecond,
}

impl TimePrecision {
    /// The finest precision supported.
    pub const FINEST: TimePrecision = TimePrecision::Nanosecond;

    pub fn is_finest(self) -> bool {
        self == Self::FINEST
    }
}

/// Target type of a field, carrying the metadata that belongs to it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Int64,
    UInt64,
    Float64,
    Bool,
    String,
    Binary,
    Time {
        precision: TimePrecision,
    },
    /// Nested record. Without a nested schema the mapping passes through.
    Map {
        fields: Option<Schema>,
    },
    /// Ordered sequence. A missing element definition makes the field
    /// invalid at normalize time.
    Array {
        element: Option<Box<FieldDefinition>>,
    },
    Any,
}

impl FieldType {
    /// Name used in schema JSON and in log messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Int64 => "int",
            FieldType::UInt64 => "uint",
            FieldType::Float64 => "float",
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Binary => "binary",
            FieldType::Time { .. } => "time",
            FieldType::Map { .. } => "map",
            FieldType::Array { .. } => "array",
            FieldType::Any => "any",
        }
    }

    /// Scalar types fall back to a zero value when coercion fails; `time`,
    /// `map` and `array` fields are omitted instead.
    pub fn has_zero_fallback(&self) -> bool {
        !matches!(
            self,
            FieldType::Time { .. } | FieldType::Map { .. } | FieldType::Array { .. }
        )
    }
}

/// Describes one schema field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub field_type: FieldType,
    pub not_null: bool,
}

impl FieldDefinition {
    #[must_use]
    pub fn new(field_type: FieldType) -> Self {
        Self {
            field_type,
            not_null: false,
        }
    }

    pub fn int() -> Self {
        Self::new(FieldType::Int64)
    }

    pub fn uint() -> Self {
        Self::new(FieldType::UInt64)
    }

    pub fn float() -> Self {
        Self::new(FieldType::Float64)
    }

    pub fn boolean() -> Self {
        Self::new(FieldType::Bool)
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn binary() -> Self {
        Self::new(FieldType::Binary)
    }

    pub fn any() -> Self {
        Self::new(FieldType::Any)
    }

    pub fn time(precision: TimePrecision) -> Self {
        Self::new(FieldType::Time { precision })
    }

    pub fn map(fields: Schema) -> Self {
        Self::new(FieldType::Map {
            fields: Some(fields),
        })
    }

    pub fn array(element: FieldDefinition) -> Self {
        Self::new(FieldType::Array {
            element: Some(Box::new(element)),
        })
    }

    /// Marks the field as non-nullable.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn is_nullable(&self) -> bool {
        !self.not_null
    }
}
