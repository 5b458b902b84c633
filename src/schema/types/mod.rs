pub mod errors;
pub mod fields;
pub mod schema;

pub use errors::SchemaError;
pub use fields::{FieldDefinition, FieldType, TimePrecision};
pub use schema::Schema;
