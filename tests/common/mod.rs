//! Shared helpers for the integration tests.

#![allow(dead_code)]

use schemer::value::record_from_json;
use schemer::{Record, Schema, SchemaInterpreter, Transformer, Value};

/// Routes library logging to the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn schema(json: &str) -> Schema {
    SchemaInterpreter::new()
        .interpret_str(json)
        .expect("test schema should load")
}

pub fn record(value: serde_json::Value) -> Record {
    record_from_json(value).expect("test input should be a JSON object")
}

/// A transformer that uses `json` as both source and destination schema and
/// passes records through unchanged.
pub fn setup_transformer(json: &str) -> (Transformer, Schema) {
    init_logging();
    let source = schema(json);
    let transformer = Transformer::new(Some(source.clone()), Some(schema(json)))
        .expect("transformer should build");
    transformer
        .set_script("return source")
        .expect("identity script should compile");
    (transformer, source)
}

/// Normalizes `raw` against the source schema, transforms it, and returns
/// the single resulting record.
pub fn transform_one(transformer: &Transformer, source_schema: &Schema, raw: serde_json::Value) -> Record {
    let source = source_schema.normalize(&record(raw));
    let mut output = transformer
        .transform(&Record::new(), &source)
        .expect("transform should succeed");
    assert_eq!(output.len(), 1, "expected exactly one record");
    output.remove(0)
}

pub fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|s| Value::from(*s)).collect())
}

pub fn bytes(items: &[&[u8]]) -> Value {
    Value::Array(items.iter().map(|b| Value::Bytes(b.to_vec())).collect())
}
