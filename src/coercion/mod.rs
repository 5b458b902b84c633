//! Coercion of raw values into the canonical representation of a field type.
//!
//! Every function here is pure: the input is borrowed and a fresh value is
//! returned. Failures are reported as [`InvalidType`] and recovered by the
//! walker in [`crate::schema::normalize`].

pub mod numeric;
pub mod time;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::schema::{FieldDefinition, FieldType, Schema};
use crate::value::{Record, Value};

pub use numeric::{format_float, parse_int64, parse_uint64};
pub use time::{format_rfc3339_nano, parse_time, zero_time};

/// A value could not be represented in the requested field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid type")]
pub struct InvalidType;

pub type CoercionResult<T> = Result<T, InvalidType>;

/// Coerces `value` into the canonical form for `definition`.
///
/// Returns `Ok(None)` when the field is nullable and the value is null, which
/// callers treat as "absent".
pub fn coerce(definition: &FieldDefinition, value: &Value) -> CoercionResult<Option<Value>> {
    if definition.is_nullable() && value.is_null() {
        return Ok(None);
    }

    let coerced = match &definition.field_type {
        FieldType::Int64 => Value::Int(coerce_int(value)?),
        FieldType::UInt64 => Value::UInt(coerce_uint(value)?),
        FieldType::Float64 => Value::Float(coerce_float(value)?),
        FieldType::Bool => Value::Bool(coerce_bool(value)?),
        FieldType::String => Value::String(coerce_string(value)?),
        FieldType::Binary => Value::Bytes(coerce_binary(value)?),
        FieldType::Time { .. } => Value::Time(coerce_time(value)?),
        FieldType::Map { fields } => Value::Map(coerce_map(fields.as_ref(), value)?),
        FieldType::Array { element } => Value::Array(coerce_array(element.as_deref(), value)?),
        FieldType::Any => value.clone(),
    };

    Ok(Some(coerced))
}

/// Zero value stored by the walker when coercion of a scalar field fails.
/// `None` for types whose field is omitted instead.
pub fn zero_value(field_type: &FieldType) -> Option<Value> {
    match field_type {
        FieldType::Int64 => Some(Value::Int(0)),
        FieldType::UInt64 => Some(Value::UInt(0)),
        FieldType::Float64 => Some(Value::Float(0.0)),
        FieldType::Bool => Some(Value::Bool(false)),
        FieldType::String => Some(Value::String(String::new())),
        FieldType::Binary => Some(Value::Bytes(Vec::new())),
        FieldType::Any => Some(Value::Null),
        FieldType::Time { .. } | FieldType::Map { .. } | FieldType::Array { .. } => None,
    }
}

pub fn coerce_int(value: &Value) -> CoercionResult<i64> {
    match value {
        Value::Int(i) => Ok(*i),
        Value::UInt(u) => Ok(*u as i64),
        Value::Float(f) => numeric::float_to_int64(*f),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::String(s) => parse_int64(s),
        Value::Time(t) => Ok(t.timestamp()),
        Value::Null | Value::Bytes(_) | Value::Array(_) | Value::Map(_) => Ok(0),
    }
}

pub fn coerce_uint(value: &Value) -> CoercionResult<u64> {
    match value {
        Value::Int(i) => u64::try_from(*i).map_err(|_| InvalidType),
        Value::UInt(u) => Ok(*u),
        Value::Float(f) => numeric::float_to_uint64(*f),
        Value::Bool(b) => Ok(u64::from(*b)),
        Value::String(s) => parse_uint64(s),
        Value::Time(t) => Ok(t.timestamp() as u64),
        Value::Null | Value::Bytes(_) | Value::Array(_) | Value::Map(_) => Ok(0),
    }
}

pub fn coerce_float(value: &Value) -> CoercionResult<f64> {
    match value {
        Value::Int(i) => Ok(*i as f64),
        Value::UInt(u) => Ok(*u as f64),
        Value::Float(f) => Ok(*f),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => parse_float(s),
        Value::Time(t) => Ok(t.timestamp() as f64),
        Value::Null | Value::Bytes(_) | Value::Array(_) | Value::Map(_) => Ok(0.0),
    }
}

pub fn coerce_bool(value: &Value) -> CoercionResult<bool> {
    match value {
        Value::Int(i) => Ok(*i > 0),
        Value::UInt(u) => Ok(*u > 0),
        Value::Float(f) => Ok(*f > 0.0),
        Value::Bool(b) => Ok(*b),
        Value::String(s) => parse_bool(s),
        Value::Time(_) => Ok(true),
        Value::Null | Value::Bytes(_) | Value::Array(_) | Value::Map(_) => Ok(false),
    }
}

/// Finite text that overflows to an infinity is out of range. Spelled-out
/// infinities are accepted.
fn parse_float(text: &str) -> CoercionResult<f64> {
    let value = text.parse::<f64>().map_err(|_| InvalidType)?;
    if value.is_infinite() && !text.to_ascii_lowercase().contains("inf") {
        return Err(InvalidType);
    }
    Ok(value)
}

fn parse_bool(text: &str) -> CoercionResult<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(InvalidType),
    }
}

pub fn coerce_string(value: &Value) -> CoercionResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::UInt(u) => Ok(u.to_string()),
        Value::Float(f) => Ok(format_float(*f)),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Time(t) => Ok(format_rfc3339_nano(t)),
        Value::Bytes(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Map(_) => Err(InvalidType),
    }
}

/// Byte sequences pass through, strings yield their UTF-8 bytes, and
/// sequences of numbers are narrowed element by element. Elements that do
/// not read as an unsigned integer become `0`.
pub fn coerce_binary(value: &Value) -> CoercionResult<Vec<u8>> {
    match value {
        Value::Bytes(bytes) => Ok(bytes.clone()),
        Value::String(s) => Ok(s.as_bytes().to_vec()),
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| coerce_uint(item).unwrap_or(0) as u8)
            .collect()),
        _ => Err(InvalidType),
    }
}

pub fn coerce_time(value: &Value) -> CoercionResult<DateTime<Utc>> {
    parse_time(value)
}

/// Only mappings are accepted. With a nested schema the mapping is
/// normalized recursively; without one it passes through unchanged.
pub fn coerce_map(fields: Option<&Schema>, value: &Value) -> CoercionResult<Record> {
    let raw = value.as_map().ok_or(InvalidType)?;
    Ok(match fields {
        Some(schema) => schema.normalize(raw),
        None => raw.clone(),
    })
}

/// Coerces every element against `element`. A single failed or null element
/// invalidates the whole array.
pub fn coerce_array(
    element: Option<&FieldDefinition>,
    value: &Value,
) -> CoercionResult<Vec<Value>> {
    let element = element.ok_or(InvalidType)?;

    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| coerce(element, item)?.ok_or(InvalidType))
            .collect(),
        Value::Bytes(bytes) => bytes
            .iter()
            .map(|b| coerce(element, &Value::UInt(u64::from(*b)))?.ok_or(InvalidType))
            .collect(),
        _ => Err(InvalidType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TimePrecision;

    #[test]
    fn test_int_coercion() {
        assert_eq!(coerce_int(&Value::from("18446744073709551615")), Ok(-1));
        assert_eq!(coerce_int(&Value::from("5.6")), Ok(5));
        assert_eq!(coerce_int(&Value::Float(5.6)), Ok(5));
        assert_eq!(coerce_int(&Value::UInt(u64::MAX)), Ok(-1));
        assert_eq!(coerce_int(&Value::Bool(true)), Ok(1));
        assert_eq!(coerce_int(&Value::from("abc")), Err(InvalidType));
    }

    #[test]
    fn test_uint_coercion() {
        assert_eq!(coerce_uint(&Value::from("-1")), Ok(u64::MAX));
        assert_eq!(coerce_uint(&Value::Int(0)), Ok(0));
        assert_eq!(coerce_uint(&Value::Int(-3)), Err(InvalidType));
        assert_eq!(coerce_uint(&Value::Float(12.9)), Ok(12));
    }

    #[test]
    fn test_float_coercion() {
        assert_eq!(coerce_float(&Value::from("1.25")), Ok(1.25));
        assert_eq!(coerce_float(&Value::from("abc")), Err(InvalidType));
        assert_eq!(coerce_float(&Value::from("")), Err(InvalidType));
        assert_eq!(coerce_float(&Value::Int(-4)), Ok(-4.0));
    }

    #[test]
    fn test_float_overflow_is_invalid() {
        assert_eq!(coerce_float(&Value::from("1e400")), Err(InvalidType));
        assert_eq!(coerce_float(&Value::from("-1e400")), Err(InvalidType));
        assert_eq!(coerce_float(&Value::from("Inf")), Ok(f64::INFINITY));
        assert_eq!(coerce_float(&Value::from("1e308")), Ok(1e308));
    }

    #[test]
    fn test_bool_coercion() {
        assert_eq!(coerce_bool(&Value::from("T")), Ok(true));
        assert_eq!(coerce_bool(&Value::from("False")), Ok(false));
        assert_eq!(coerce_bool(&Value::from("yes")), Err(InvalidType));
        assert_eq!(coerce_bool(&Value::Float(0.1)), Ok(true));
        assert_eq!(coerce_bool(&Value::Int(-1)), Ok(false));
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(coerce_string(&Value::Float(1e21)).unwrap(), "1000000000000000000000");
        assert_eq!(coerce_string(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(coerce_string(&Value::Bytes(b"hi".to_vec())).unwrap(), "hi");
        assert_eq!(coerce_string(&Value::Array(vec![])), Err(InvalidType));
    }

    #[test]
    fn test_binary_coercion() {
        let narrowed = coerce_binary(&Value::Array(vec![
            Value::Int(0),
            Value::Int(1),
            Value::Int(2),
        ]));
        assert_eq!(narrowed, Ok(vec![0x00, 0x01, 0x02]));
        assert_eq!(coerce_binary(&Value::from("ab")), Ok(vec![b'a', b'b']));
        assert_eq!(coerce_binary(&Value::Int(1)), Err(InvalidType));
        assert_eq!(coerce_binary(&Value::Null), Err(InvalidType));
    }

    #[test]
    fn test_nullable_null_is_absent() {
        assert_eq!(coerce(&FieldDefinition::int(), &Value::Null), Ok(None));
        assert_eq!(
            coerce(&FieldDefinition::int().not_null(), &Value::Null),
            Ok(Some(Value::Int(0)))
        );
        assert_eq!(
            coerce(&FieldDefinition::any().not_null(), &Value::Null),
            Ok(Some(Value::Null))
        );
    }

    #[test]
    fn test_array_rejects_bad_element() {
        let ints = FieldDefinition::array(FieldDefinition::int());
        let mixed = Value::Array(vec![Value::Int(1), Value::from("a"), Value::Float(5.6)]);
        assert_eq!(coerce(&ints, &mixed), Err(InvalidType));

        let anys = FieldDefinition::array(FieldDefinition::any());
        assert_eq!(coerce(&anys, &mixed), Ok(Some(mixed.clone())));

        let with_null = Value::Array(vec![Value::Int(1), Value::Null]);
        assert_eq!(coerce(&ints, &with_null), Err(InvalidType));
    }

    #[test]
    fn test_array_from_bytes() {
        let uints = FieldDefinition::array(FieldDefinition::uint());
        assert_eq!(
            coerce(&uints, &Value::Bytes(vec![7, 8])),
            Ok(Some(Value::Array(vec![Value::UInt(7), Value::UInt(8)])))
        );
    }

    #[test]
    fn test_array_without_element_is_invalid() {
        let definition = FieldDefinition::new(FieldType::Array { element: None });
        assert_eq!(
            coerce(&definition, &Value::Array(vec![Value::Int(1)])),
            Err(InvalidType)
        );
    }

    #[test]
    fn test_time_elements_only_fail_on_empty() {
        let times = FieldDefinition::array(FieldDefinition::time(TimePrecision::Second));
        let coerced = coerce(&times, &Value::Array(vec![Value::from("nope")])).unwrap();
        assert_eq!(coerced, Some(Value::Array(vec![Value::Time(zero_time())])));

        let empty = Value::Array(vec![Value::from("")]);
        assert_eq!(coerce(&times, &empty), Err(InvalidType));
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(zero_value(&FieldType::Float64), Some(Value::Float(0.0)));
        assert_eq!(
            zero_value(&FieldType::Time {
                precision: TimePrecision::Second
            }),
            None
        );
    }
}
