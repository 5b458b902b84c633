mod common;

use common::{init_logging, record};
use schemer::{
    FieldDefinition, FieldType, Schema, SchemaError, SchemaInterpreter, TimePrecision, Value,
};
use serde_json::json;
use std::fs;
use tempfile::tempdir;

const ORDER_SCHEMA: &str = r#"{
    "id": { "type": "uint", "notNull": true },
    "customer": { "type": "map", "fields": {
        "name": { "type": "string" },
        "since": { "type": "time", "precision": "second" }
    } },
    "items": { "type": "array", "subtype": "map", "fields": {
        "sku": { "type": "string" },
        "qty": { "type": "int" }
    } },
    "grid": { "type": "array", "subtype": { "type": "array", "subtype": "float" } },
    "payload": { "type": "bytes" },
    "extra": { "type": "any" }
}"#;

#[test]
fn test_schema_from_file() {
    init_logging();
    let dir = tempdir().unwrap();
    let path = dir.path().join("order.json");
    fs::write(&path, ORDER_SCHEMA).unwrap();

    let schema = SchemaInterpreter::new().interpret_file(&path).unwrap();
    assert_eq!(schema.len(), 6);
    assert_eq!(schema.field("id"), Some(&FieldDefinition::uint().not_null()));
    assert_eq!(schema.field("payload"), Some(&FieldDefinition::binary()));
    assert_eq!(
        schema.field("customer"),
        Some(&FieldDefinition::map(
            Schema::new()
                .with_field("name", FieldDefinition::string())
                .with_field("since", FieldDefinition::time(TimePrecision::Second))
        ))
    );
    assert_eq!(
        schema.field("grid"),
        Some(&FieldDefinition::array(FieldDefinition::array(FieldDefinition::float())))
    );
    match &schema.field("items").unwrap().field_type {
        FieldType::Array { element: Some(element) } => {
            assert!(matches!(element.field_type, FieldType::Map { fields: Some(_) }));
        }
        other => panic!("unexpected items type {:?}", other),
    }
}

#[test]
fn test_loaded_schema_normalizes() {
    let schema = SchemaInterpreter::new().interpret_str(ORDER_SCHEMA).unwrap();
    let normalized = schema.normalize(&record(json!({
        "id": "42",
        "items": [{ "sku": 7, "qty": "2", "note": "drop" }],
        "grid": [[1, "2.5"], []],
        "payload": [104, 105],
        "unknown": true
    })));

    let mut expected = record(json!({
        "items": [{ "sku": "7", "qty": 2 }],
        "grid": [[1.0, 2.5], []]
    }));
    expected.insert("id".to_string(), Value::UInt(42));
    expected.insert("payload".to_string(), Value::Bytes(b"hi".to_vec()));
    assert_eq!(normalized, expected);
}

#[test]
fn test_schema_errors() {
    let interpreter = SchemaInterpreter::new();

    assert!(matches!(
        interpreter.interpret_str("{ not json"),
        Err(SchemaError::InvalidJson(_))
    ));
    assert!(matches!(
        interpreter.interpret_str(r#"{ "a": { "type": "decimal" } }"#),
        Err(SchemaError::UnknownType { .. })
    ));
    assert!(interpreter
        .interpret_str(r#"{ "a": { "type": "array" } }"#)
        .is_err());
    assert!(interpreter
        .interpret_str(r#"{ "a": { "type": "array", "subtype": "decimal" } }"#)
        .is_err());
    assert!(matches!(
        interpreter.interpret_file("/nonexistent/schema.json"),
        Err(SchemaError::Io(_))
    ));
}
