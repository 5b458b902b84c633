//! Schema definitions and the normalization walker.

pub mod normalize;
pub mod types;

pub use types::{FieldDefinition, FieldType, Schema, SchemaError, TimePrecision};
