//! Values as seen from inside the bundled script engine.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::coercion::{format_float, format_rfc3339_nano};
use crate::coercion::time::from_unix_millis;

pub type ScriptObject = BTreeMap<String, ScriptValue>;
pub type ScriptArray = Vec<ScriptValue>;

/// Handle to script-owned storage. Clones alias the same storage, so a write
/// through one handle is seen through all of them.
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identity comparison, as `===` does for objects.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the storage, for cycle detection.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: PartialEq> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.read() == *other.read()
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.read(), f)
    }
}

/// Containers already on the current walk. A container met again is a cycle.
#[derive(Default)]
pub struct Visited(Vec<usize>);

impl Visited {
    /// Marks `id` as entered. Returns `false` when it already was.
    pub fn enter(&mut self, id: usize) -> bool {
        if self.0.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn leave(&mut self) {
        self.0.pop();
    }
}

/// A script value. Numbers keep their integer kind until arithmetic forces a
/// float. Arrays and objects are shared handles.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Undefined,
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Native date, epoch milliseconds.
    Date(i64),
    /// Host timestamp with full precision. Opaque to scripts apart from a
    /// few accessors.
    Timestamp(DateTime<Utc>),
    Array(Shared<ScriptArray>),
    Object(Shared<ScriptObject>),
}

impl ScriptValue {
    pub fn array(items: ScriptArray) -> Self {
        ScriptValue::Array(Shared::new(items))
    }

    pub fn object(map: ScriptObject) -> Self {
        ScriptValue::Object(Shared::new(map))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, ScriptValue::Undefined | ScriptValue::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            ScriptValue::Int(_) | ScriptValue::UInt(_) | ScriptValue::Float(_)
        )
    }

    pub fn truthy(&self) -> bool {
        match self {
            ScriptValue::Undefined | ScriptValue::Null => false,
            ScriptValue::Bool(b) => *b,
            ScriptValue::Int(i) => *i != 0,
            ScriptValue::UInt(u) => *u != 0,
            ScriptValue::Float(f) => *f != 0.0 && !f.is_nan(),
            ScriptValue::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Int(_) | ScriptValue::UInt(_) | ScriptValue::Float(_) => "number",
            ScriptValue::String(_) => "string",
            _ => "object",
        }
    }

    /// Numeric view used by arithmetic and comparisons.
    pub fn to_number(&self) -> f64 {
        match self {
            ScriptValue::Undefined => f64::NAN,
            ScriptValue::Null => 0.0,
            ScriptValue::Bool(b) => f64::from(u8::from(*b)),
            ScriptValue::Int(i) => *i as f64,
            ScriptValue::UInt(u) => *u as f64,
            ScriptValue::Float(f) => *f,
            ScriptValue::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            ScriptValue::Date(ms) => *ms as f64,
            ScriptValue::Timestamp(t) => t.timestamp_millis() as f64,
            ScriptValue::Bytes(_) | ScriptValue::Array(_) | ScriptValue::Object(_) => f64::NAN,
        }
    }

    /// Exact integer view, when the value is an integer or an integral float.
    pub fn to_integer(&self) -> Option<i128> {
        match self {
            ScriptValue::Int(i) => Some(i128::from(*i)),
            ScriptValue::UInt(u) => Some(i128::from(*u)),
            ScriptValue::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e36 => {
                Some(*f as i128)
            }
            _ => None,
        }
    }

    /// Packs an integer result into the narrowest integer kind that holds it.
    pub fn from_integer(value: i128) -> ScriptValue {
        if let Ok(i) = i64::try_from(value) {
            ScriptValue::Int(i)
        } else if let Ok(u) = u64::try_from(value) {
            ScriptValue::UInt(u)
        } else {
            ScriptValue::Float(value as f64)
        }
    }

    /// Property key text for member and index access.
    pub fn to_key(&self) -> String {
        match self {
            ScriptValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        self.to_integer().and_then(|i| usize::try_from(i).ok())
    }
}

pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else {
        format_float(value)
    }
}

/// `Array.prototype.join`: nullish elements and cyclic references render
/// empty.
pub fn join(items: &Shared<ScriptArray>, separator: &str) -> String {
    join_visited(items, separator, &mut Visited::default())
}

fn join_visited(items: &Shared<ScriptArray>, separator: &str, visited: &mut Visited) -> String {
    if !visited.enter(items.id()) {
        return String::new();
    }
    let parts: Vec<String> = items
        .read()
        .iter()
        .map(|item| match item {
            ScriptValue::Undefined | ScriptValue::Null => String::new(),
            ScriptValue::Array(inner) => join_visited(inner, ",", visited),
            other => other.to_string(),
        })
        .collect();
    visited.leave();
    parts.join(separator)
}

pub fn format_date(epoch_millis: i64) -> String {
    from_unix_millis(epoch_millis)
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

impl fmt::Display for ScriptValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptValue::Undefined => write!(f, "undefined"),
            ScriptValue::Null => write!(f, "null"),
            ScriptValue::Bool(b) => write!(f, "{}", b),
            ScriptValue::Int(i) => write!(f, "{}", i),
            ScriptValue::UInt(u) => write!(f, "{}", u),
            ScriptValue::Float(n) => write!(f, "{}", format_number(*n)),
            ScriptValue::String(s) => write!(f, "{}", s),
            ScriptValue::Bytes(bytes) => {
                let parts: Vec<String> = bytes.iter().map(u8::to_string).collect();
                write!(f, "{}", parts.join(","))
            }
            ScriptValue::Date(ms) => write!(f, "{}", format_date(*ms)),
            ScriptValue::Timestamp(t) => write!(f, "{}", format_rfc3339_nano(t)),
            ScriptValue::Array(items) => write!(f, "{}", join(items, ",")),
            ScriptValue::Object(_) => write!(f, "[object Object]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!ScriptValue::Float(f64::NAN).truthy());
        assert!(!ScriptValue::String(String::new()).truthy());
        assert!(ScriptValue::array(vec![]).truthy());
        assert!(!ScriptValue::Undefined.truthy());
    }

    #[test]
    fn test_display() {
        assert_eq!(ScriptValue::Float(2.0).to_string(), "2");
        assert_eq!(ScriptValue::Float(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(
            ScriptValue::array(vec![ScriptValue::Int(1), ScriptValue::Null, ScriptValue::Int(3)])
                .to_string(),
            "1,,3"
        );
        assert_eq!(ScriptValue::Date(0).to_string(), "1970-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_clones_share_storage() {
        let original = ScriptValue::object(ScriptObject::new());
        let alias = original.clone();
        if let ScriptValue::Object(map) = &alias {
            map.write().insert("k".to_string(), ScriptValue::Int(1));
        }
        let ScriptValue::Object(map) = &original else {
            panic!("expected object");
        };
        assert_eq!(map.read().get("k"), Some(&ScriptValue::Int(1)));
    }

    #[test]
    fn test_cyclic_array_display() {
        let items = Shared::new(vec![ScriptValue::Int(1)]);
        items.write().push(ScriptValue::Array(items.clone()));
        assert_eq!(ScriptValue::Array(items.clone()).to_string(), "1,");
        // break the cycle so the storage is freed
        items.write().clear();
    }

    #[test]
    fn test_integer_packing() {
        assert_eq!(ScriptValue::from_integer(5), ScriptValue::Int(5));
        assert_eq!(
            ScriptValue::from_integer(i128::from(u64::MAX)),
            ScriptValue::UInt(u64::MAX)
        );
        assert_eq!(ScriptValue::Float(3.0).to_integer(), Some(3));
        assert_eq!(ScriptValue::Float(3.5).to_integer(), None);
    }
}
