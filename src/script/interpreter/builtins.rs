use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;

use crate::coercion::format_rfc3339_nano;
use crate::script::value::{format_date, ScriptObject, ScriptValue, Visited};
use crate::script::NativeFunction;

/// Name of the builtin that strips values with no canonical representation.
pub const SCAN_STRUCT: &str = "scanStruct";

fn native(
    function: impl Fn(&[ScriptValue]) -> Result<ScriptValue, String> + Send + Sync + 'static,
) -> NativeFunction<ScriptValue> {
    Arc::new(function)
}

fn first(args: &[ScriptValue]) -> &ScriptValue {
    args.first().unwrap_or(&ScriptValue::Undefined)
}

/// Float results that are whole numbers come back as integers.
fn number_result(value: f64) -> ScriptValue {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e18 {
        ScriptValue::Int(value as i64)
    } else {
        ScriptValue::Float(value)
    }
}

fn math_unary(name: &'static str, op: fn(f64) -> f64) -> NativeFunction<ScriptValue> {
    native(move |args| match first(args) {
        ScriptValue::Int(_) | ScriptValue::UInt(_) if name != "abs" => Ok(first(args).clone()),
        value => Ok(number_result(op(value.to_number()))),
    })
}

/// Returns the builtin native functions of the script engine.
pub fn builtin_functions() -> HashMap<String, NativeFunction<ScriptValue>> {
    let mut functions: HashMap<String, NativeFunction<ScriptValue>> = HashMap::new();

    functions.insert(
        SCAN_STRUCT.to_string(),
        native(|args| scan_struct(first(args))),
    );

    // Object functions
    functions.insert(
        "Object.keys".to_string(),
        native(|args| match first(args) {
            ScriptValue::Object(map) => Ok(ScriptValue::array(
                map.read().keys().cloned().map(ScriptValue::String).collect(),
            )),
            ScriptValue::Array(items) => Ok(ScriptValue::array(
                (0..items.read().len())
                    .map(|i| ScriptValue::String(i.to_string()))
                    .collect(),
            )),
            value if value.is_nullish() => {
                Err("Cannot convert undefined or null to object".to_string())
            }
            _ => Ok(ScriptValue::array(Vec::new())),
        }),
    );
    functions.insert(
        "Object.values".to_string(),
        native(|args| match first(args) {
            ScriptValue::Object(map) => Ok(ScriptValue::array(map.read().values().cloned().collect())),
            ScriptValue::Array(items) => Ok(ScriptValue::array(items.read().clone())),
            value if value.is_nullish() => {
                Err("Cannot convert undefined or null to object".to_string())
            }
            _ => Ok(ScriptValue::array(Vec::new())),
        }),
    );

    // Math functions
    functions.insert(
        "Math.min".to_string(),
        native(|args| {
            let result = args
                .iter()
                .map(ScriptValue::to_number)
                .fold(f64::INFINITY, |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) });
            Ok(number_result(result))
        }),
    );
    functions.insert(
        "Math.max".to_string(),
        native(|args| {
            let result = args
                .iter()
                .map(ScriptValue::to_number)
                .fold(f64::NEG_INFINITY, |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) });
            Ok(number_result(result))
        }),
    );
    functions.insert("Math.floor".to_string(), math_unary("floor", f64::floor));
    functions.insert("Math.ceil".to_string(), math_unary("ceil", f64::ceil));
    functions.insert(
        "Math.round".to_string(),
        math_unary("round", |n| (n + 0.5).floor()),
    );
    functions.insert("Math.abs".to_string(), math_unary("abs", f64::abs));

    // Conversion functions
    functions.insert(
        "String".to_string(),
        native(|args| {
            Ok(ScriptValue::String(match args.first() {
                Some(value) => value.to_string(),
                None => String::new(),
            }))
        }),
    );
    functions.insert(
        "Number".to_string(),
        native(|args| {
            Ok(match args.first() {
                Some(value @ (ScriptValue::Int(_) | ScriptValue::UInt(_) | ScriptValue::Float(_))) => {
                    value.clone()
                }
                Some(value) => ScriptValue::Float(value.to_number()),
                None => ScriptValue::Int(0),
            })
        }),
    );
    functions.insert(
        "Boolean".to_string(),
        native(|args| Ok(ScriptValue::Bool(first(args).truthy()))),
    );
    functions.insert(
        "isNaN".to_string(),
        native(|args| Ok(ScriptValue::Bool(first(args).to_number().is_nan()))),
    );
    functions.insert(
        "parseInt".to_string(),
        native(|args| {
            let radix = match args.get(1) {
                Some(value) if !value.is_nullish() => value.to_number() as u32,
                _ => 10,
            };
            Ok(parse_int(&first(args).to_string(), radix))
        }),
    );
    functions.insert(
        "parseFloat".to_string(),
        native(|args| Ok(ScriptValue::Float(parse_float(&first(args).to_string())))),
    );

    functions.insert(
        "JSON.stringify".to_string(),
        native(|args| match to_json(first(args))? {
            Some(json) => serde_json::to_string(&json)
                .map(ScriptValue::String)
                .map_err(|e| e.to_string()),
            None => Ok(ScriptValue::Undefined),
        }),
    );

    functions
}

fn unrepresentable(value: &ScriptValue) -> bool {
    match value {
        ScriptValue::Undefined => true,
        ScriptValue::Float(f) => !f.is_finite(),
        _ => false,
    }
}

const CIRCULAR: &str = "Converting circular structure";

/// Deep scrub of a script result: object keys holding undefined, NaN or an
/// infinity are removed, array elements holding those (or null) become null.
/// Null object values are kept. The result is a fresh copy; circular
/// structures are an error.
pub fn scan_struct(value: &ScriptValue) -> Result<ScriptValue, String> {
    scan_visited(value, &mut Visited::default())
}

fn scan_visited(value: &ScriptValue, visited: &mut Visited) -> Result<ScriptValue, String> {
    let scanned = match value {
        ScriptValue::Object(map) => {
            if !visited.enter(map.id()) {
                return Err(CIRCULAR.to_string());
            }
            let mut scrubbed = ScriptObject::new();
            for (key, item) in map.read().iter() {
                if !unrepresentable(item) {
                    scrubbed.insert(key.clone(), scan_visited(item, visited)?);
                }
            }
            visited.leave();
            ScriptValue::object(scrubbed)
        }
        ScriptValue::Array(items) => {
            if !visited.enter(items.id()) {
                return Err(CIRCULAR.to_string());
            }
            let mut scrubbed = Vec::new();
            for item in items.read().iter() {
                if unrepresentable(item) || matches!(item, ScriptValue::Null) {
                    scrubbed.push(ScriptValue::Null);
                } else {
                    scrubbed.push(scan_visited(item, visited)?);
                }
            }
            visited.leave();
            ScriptValue::array(scrubbed)
        }
        other => other.clone(),
    };
    Ok(scanned)
}

/// Leading-integer parse: optional sign, then digits of `radix`. NaN when
/// no digit is found.
fn parse_int(text: &str, radix: u32) -> ScriptValue {
    let radix = if radix == 0 { 10 } else { radix };
    if !(2..=36).contains(&radix) {
        return ScriptValue::Float(f64::NAN);
    }

    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let rest = if radix == 16 {
        rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")).unwrap_or(rest)
    } else {
        rest
    };

    let digits: String = rest.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return ScriptValue::Float(f64::NAN);
    }

    match i128::from_str_radix(&digits, radix) {
        Ok(value) => ScriptValue::from_integer(if negative { -value } else { value }),
        Err(_) => {
            let magnitude = digits
                .chars()
                .filter_map(|c| c.to_digit(radix))
                .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
            ScriptValue::Float(if negative { -magnitude } else { magnitude })
        }
    }
}

/// Longest-prefix float parse. NaN when no prefix reads as a number.
fn parse_float(text: &str) -> f64 {
    let trimmed = text.trim_start();
    for infinity in ["Infinity", "+Infinity"] {
        if trimmed.starts_with(infinity) {
            return f64::INFINITY;
        }
    }
    if trimmed.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }

    let candidate: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        .collect();
    (1..=candidate.len())
        .rev()
        .find_map(|end| candidate[..end].parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

/// JSON view of a script value. `None` for undefined.
pub fn to_json(value: &ScriptValue) -> Result<Option<JsonValue>, String> {
    json_visited(value, &mut Visited::default())
}

fn json_visited(value: &ScriptValue, visited: &mut Visited) -> Result<Option<JsonValue>, String> {
    let json = match value {
        ScriptValue::Undefined => return Ok(None),
        ScriptValue::Null => JsonValue::Null,
        ScriptValue::Bool(b) => JsonValue::Bool(*b),
        ScriptValue::Int(i) => JsonValue::from(*i),
        ScriptValue::UInt(u) => JsonValue::from(*u),
        ScriptValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ScriptValue::String(s) => JsonValue::String(s.clone()),
        ScriptValue::Bytes(bytes) => JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect()),
        ScriptValue::Date(ms) => JsonValue::String(format_date(*ms)),
        ScriptValue::Timestamp(t) => JsonValue::String(format_rfc3339_nano(t)),
        ScriptValue::Array(items) => {
            if !visited.enter(items.id()) {
                return Err(format!("{CIRCULAR} to JSON"));
            }
            let mut elements = Vec::new();
            for item in items.read().iter() {
                elements.push(json_visited(item, visited)?.unwrap_or(JsonValue::Null));
            }
            visited.leave();
            JsonValue::Array(elements)
        }
        ScriptValue::Object(map) => {
            if !visited.enter(map.id()) {
                return Err(format!("{CIRCULAR} to JSON"));
            }
            let mut fields = serde_json::Map::new();
            for (key, item) in map.read().iter() {
                if let Some(json) = json_visited(item, visited)? {
                    fields.insert(key.clone(), json);
                }
            }
            visited.leave();
            JsonValue::Object(fields)
        }
    };
    Ok(Some(json))
}
