//! Property access and built-in methods on script values.

use crate::coercion::format_rfc3339_nano;
use crate::script::error::ScriptError;
use crate::script::value::{format_date, join, ScriptValue};

use super::operators::strict_equals;

fn nullish_access(receiver: &ScriptValue, key: &str, action: &str) -> ScriptError {
    let progressive = if action == "set" { "setting" } else { "reading" };
    ScriptError::runtime(format!(
        "Cannot {action} properties of {receiver} ({progressive} '{key}')"
    ))
}

/// Reads `receiver[key]`. Missing properties read as `undefined`.
pub fn get_property(receiver: &ScriptValue, key: &ScriptValue) -> Result<ScriptValue, ScriptError> {
    let name = key.to_key();
    let value = match receiver {
        ScriptValue::Undefined | ScriptValue::Null => {
            return Err(nullish_access(receiver, &name, "read"));
        }
        ScriptValue::Object(map) => map.read().get(&name).cloned().unwrap_or(ScriptValue::Undefined),
        ScriptValue::Array(items) if name == "length" => ScriptValue::Int(items.read().len() as i64),
        ScriptValue::Array(items) => key
            .as_index()
            .and_then(|i| items.read().get(i).cloned())
            .unwrap_or(ScriptValue::Undefined),
        ScriptValue::String(s) if name == "length" => ScriptValue::Int(s.chars().count() as i64),
        ScriptValue::String(s) => key
            .as_index()
            .and_then(|i| s.chars().nth(i))
            .map(|c| ScriptValue::String(c.to_string()))
            .unwrap_or(ScriptValue::Undefined),
        ScriptValue::Bytes(bytes) if name == "length" => ScriptValue::Int(bytes.len() as i64),
        ScriptValue::Bytes(bytes) => key
            .as_index()
            .and_then(|i| bytes.get(i))
            .map(|b| ScriptValue::UInt(u64::from(*b)))
            .unwrap_or(ScriptValue::Undefined),
        _ => ScriptValue::Undefined,
    };
    Ok(value)
}

/// Writes `value` at `keys` below `root`. Every container on the way must
/// already exist; only the last key is created.
pub fn set_path(
    root: &ScriptValue,
    keys: &[ScriptValue],
    value: ScriptValue,
) -> Result<(), ScriptError> {
    let Some((last, parents)) = keys.split_last() else {
        return Err(ScriptError::runtime("Invalid assignment target"));
    };
    let mut container = root.clone();
    for key in parents {
        container = get_property(&container, key)?;
    }
    set_property(&container, last, value)
}

/// Writes `container[key] = value`. Writes to primitive values are ignored.
pub fn set_property(
    container: &ScriptValue,
    key: &ScriptValue,
    value: ScriptValue,
) -> Result<(), ScriptError> {
    let name = key.to_key();
    match container {
        ScriptValue::Object(map) => {
            map.write().insert(name, value);
            Ok(())
        }
        ScriptValue::Array(items) => {
            let mut items = items.write();
            match key.as_index() {
                Some(i) if i < items.len() => {
                    items[i] = value;
                    Ok(())
                }
                Some(i) if i == items.len() => {
                    items.push(value);
                    Ok(())
                }
                Some(i) => Err(ScriptError::runtime(format!(
                    "Index {i} is past the end of an array of length {}",
                    items.len()
                ))),
                None => Err(ScriptError::runtime(format!(
                    "Invalid array index '{name}'"
                ))),
            }
        }
        ScriptValue::Undefined | ScriptValue::Null => Err(nullish_access(container, &name, "set")),
        _ => Ok(()),
    }
}

fn string_arg(args: &[ScriptValue], index: usize) -> Option<String> {
    args.get(index)
        .filter(|arg| !matches!(arg, ScriptValue::Undefined))
        .map(ScriptValue::to_string)
}

fn contains(items: &[ScriptValue], needle: &ScriptValue) -> bool {
    let needle_is_nan = matches!(needle, ScriptValue::Float(f) if f.is_nan());
    items.iter().any(|item| {
        strict_equals(item, needle)
            || (needle_is_nan && matches!(item, ScriptValue::Float(f) if f.is_nan()))
    })
}

/// Resolves a `slice` argument; negative values count from the end.
fn slice_bound(arg: Option<&ScriptValue>, len: usize, default: usize) -> usize {
    let Some(arg) = arg.filter(|arg| !matches!(arg, ScriptValue::Undefined)) else {
        return default;
    };
    let n = arg.to_number();
    if n.is_nan() {
        return 0;
    }
    let n = n.trunc();
    if n < 0.0 {
        len.saturating_sub((-n).min(len as f64) as usize)
    } else {
        n.min(len as f64) as usize
    }
}

/// Calls a built-in method on `receiver`.
pub fn call_method(
    receiver: &ScriptValue,
    name: &str,
    args: &[ScriptValue],
) -> Result<ScriptValue, ScriptError> {
    if receiver.is_nullish() {
        return Err(nullish_access(receiver, name, "read"));
    }
    if name == "toString" {
        return Ok(ScriptValue::String(receiver.to_string()));
    }

    let result = match (receiver, name) {
        (ScriptValue::String(s), "toUpperCase") => ScriptValue::String(s.to_uppercase()),
        (ScriptValue::String(s), "toLowerCase") => ScriptValue::String(s.to_lowercase()),
        (ScriptValue::String(s), "trim") => ScriptValue::String(s.trim().to_string()),
        (ScriptValue::String(s), "includes") => {
            ScriptValue::Bool(s.contains(string_arg(args, 0).unwrap_or_default().as_str()))
        }
        (ScriptValue::String(s), "startsWith") => {
            ScriptValue::Bool(s.starts_with(string_arg(args, 0).unwrap_or_default().as_str()))
        }
        (ScriptValue::String(s), "endsWith") => {
            ScriptValue::Bool(s.ends_with(string_arg(args, 0).unwrap_or_default().as_str()))
        }
        (ScriptValue::String(s), "split") => {
            let parts: Vec<ScriptValue> = match string_arg(args, 0) {
                None => vec![ScriptValue::String(s.clone())],
                Some(separator) if separator.is_empty() => s
                    .chars()
                    .map(|c| ScriptValue::String(c.to_string()))
                    .collect(),
                Some(separator) => s
                    .split(separator.as_str())
                    .map(|part| ScriptValue::String(part.to_string()))
                    .collect(),
            };
            ScriptValue::array(parts)
        }
        (ScriptValue::Array(items), "push") => {
            let mut items = items.write();
            items.extend(args.iter().cloned());
            ScriptValue::Int(items.len() as i64)
        }
        (ScriptValue::Array(items), "pop") => items.write().pop().unwrap_or(ScriptValue::Undefined),
        (ScriptValue::Array(items), "includes") => ScriptValue::Bool(contains(
            &items.read(),
            args.first().unwrap_or(&ScriptValue::Undefined),
        )),
        (ScriptValue::Array(items), "indexOf") => {
            let needle = args.first().unwrap_or(&ScriptValue::Undefined);
            let position = items.read().iter().position(|item| strict_equals(item, needle));
            ScriptValue::Int(position.map_or(-1, |i| i as i64))
        }
        (ScriptValue::Array(items), "join") => {
            let separator = string_arg(args, 0).unwrap_or_else(|| ",".to_string());
            ScriptValue::String(join(items, &separator))
        }
        (ScriptValue::Array(items), "slice") => {
            let items = items.read();
            let start = slice_bound(args.first(), items.len(), 0);
            let end = slice_bound(args.get(1), items.len(), items.len());
            let copied = items.get(start..end.max(start)).unwrap_or_default().to_vec();
            ScriptValue::array(copied)
        }
        (ScriptValue::Array(items), "concat") => {
            let mut joined = items.read().clone();
            for arg in args {
                match arg {
                    ScriptValue::Array(more) => {
                        let more = more.read().clone();
                        joined.extend(more);
                    }
                    other => joined.push(other.clone()),
                }
            }
            ScriptValue::array(joined)
        }
        (ScriptValue::Date(ms), "getTime" | "valueOf") => ScriptValue::Int(*ms),
        (ScriptValue::Date(ms), "toISOString" | "toJSON") => ScriptValue::String(format_date(*ms)),
        (ScriptValue::Timestamp(t), "getTime" | "valueOf") => {
            ScriptValue::Int(t.timestamp_millis())
        }
        (ScriptValue::Timestamp(t), "toISOString" | "toJSON") => {
            ScriptValue::String(format_rfc3339_nano(t))
        }
        (other, _) => {
            return Err(ScriptError::runtime(format!(
                "{}.{name} is not a function",
                other.type_of()
            )));
        }
    };

    Ok(result)
}
