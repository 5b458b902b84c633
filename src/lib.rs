//! # Schemer
//!
//! Schema-driven record normalization with script transformations.
//!
//! ## Core Components
//!
//! * `value` - The dynamic value model records are made of
//! * `schema` - Field definitions, schemas and the normalization walker
//! * `coercion` - Conversion of raw values into each field type
//! * `schema_interpreter` - Loading schemas from their JSON definition
//! * `script` - The sandboxed script language and its runtime capability
//! * `transformer` - Normalize, run a script, normalize the results
//! * `refs` - Expansion of dotted reference keys into nested records
//!
//! ## Architecture
//!
//! A raw record is normalized against a source schema: every field is coerced
//! into its declared type, unknown keys are dropped, and fields that fail
//! coercion fall back to a zero value or are omitted. The normalized record
//! is handed to a transformation script as `source`. Whatever the script
//! returns is normalized against a destination schema.
//!
//! Scripts run in pooled execution contexts so that one transformer can be
//! shared between threads.

pub mod coercion;
pub mod refs;
pub mod schema;
pub mod schema_interpreter;
pub mod script;
pub mod transformer;
pub mod value;

// Re-export main types for convenience
pub use coercion::{coerce, InvalidType};
pub use refs::prepare_refs;
pub use schema::{FieldDefinition, FieldType, Schema, SchemaError, TimePrecision};
pub use schema_interpreter::SchemaInterpreter;
pub use script::{ScriptEngine, ScriptError, ScriptRuntime};
pub use transformer::{TransformError, TransformResult, Transformer, TransformerConfig};
pub use value::{Record, Value};
