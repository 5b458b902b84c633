use super::grammar::ScriptParser;
use crate::script::error::ScriptError;
use crate::script::value::ScriptValue;

impl ScriptParser {
    /// Integer literals stay integers while they fit in 64 bits; everything
    /// else is a float.
    pub(super) fn parse_number(text: &str) -> Result<ScriptValue, ScriptError> {
        if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            return u64::from_str_radix(hex, 16)
                .map(|u| ScriptValue::from_integer(i128::from(u)))
                .or_else(|_| {
                    u128::from_str_radix(hex, 16)
                        .map(|u| ScriptValue::Float(u as f64))
                        .map_err(|e| ScriptError::Parse(format!("Invalid number '{text}': {e}")))
                });
        }

        if text.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(ScriptValue::Int(i));
            }
            if let Ok(u) = text.parse::<u64>() {
                return Ok(ScriptValue::UInt(u));
            }
        }

        text.parse::<f64>()
            .map(ScriptValue::Float)
            .map_err(|e| ScriptError::Parse(format!("Invalid number '{text}': {e}")))
    }

    /// Resolves backslash escapes in a string literal body.
    pub(super) fn unescape(raw: &str) -> String {
        let mut result = String::with_capacity(raw.len());
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            if c != '\\' {
                result.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('0') => result.push('\0'),
                Some('b') => result.push('\u{8}'),
                Some('f') => result.push('\u{c}'),
                Some('v') => result.push('\u{b}'),
                Some('u') => {
                    let code: String = chars.by_ref().take(4).collect();
                    match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                        Some(decoded) => result.push(decoded),
                        None => {
                            result.push('u');
                            result.push_str(&code);
                        }
                    }
                }
                Some('x') => {
                    let code: String = chars.by_ref().take(2).collect();
                    match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                        Some(decoded) => result.push(decoded),
                        None => {
                            result.push('x');
                            result.push_str(&code);
                        }
                    }
                }
                Some(other) => result.push(other),
                None => {}
            }
        }

        result
    }
}
