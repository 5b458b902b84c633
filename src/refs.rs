//! Expansion of dotted reference keys into nested records.

use crate::value::{Record, Value};

/// Turns `{"a.b.c": v}` into `{"a": {"b": {"c": v}}}`.
///
/// Keys are applied in the map's iteration order and the last write to a
/// path wins. A non-record value sitting on an intermediate segment is
/// replaced by a record.
pub fn prepare_refs(refs: &Record) -> Record {
    let mut root = Record::new();
    for (key, value) in refs {
        let segments: Vec<&str> = key.split('.').collect();
        insert_path(&mut root, &segments, value);
    }
    root
}

fn insert_path(target: &mut Record, segments: &[&str], value: &Value) {
    match segments {
        [] => {}
        [leaf] => {
            target.insert(leaf.to_string(), value.clone());
        }
        [head, rest @ ..] => {
            let slot = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Map(Record::new()));
            if let Value::Map(child) = slot {
                insert_path(child, rest, value);
            } else {
                let mut child = Record::new();
                insert_path(&mut child, rest, value);
                *slot = Value::Map(child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::record_from_json;
    use serde_json::json;

    #[test]
    fn test_nests_dotted_keys() {
        let refs = record_from_json(json!({
            "user.name": "ada",
            "user.address.city": "london",
            "plain": 1,
        }))
        .unwrap();

        let expected = record_from_json(json!({
            "user": {"name": "ada", "address": {"city": "london"}},
            "plain": 1,
        }))
        .unwrap();

        assert_eq!(prepare_refs(&refs), expected);
    }

    #[test]
    fn test_scalar_on_path_is_replaced() {
        // "a" sorts before "a.b", so the scalar is written first
        let refs = record_from_json(json!({"a": 1, "a.b": 2})).unwrap();
        let expected = record_from_json(json!({"a": {"b": 2}})).unwrap();
        assert_eq!(prepare_refs(&refs), expected);
    }

    #[test]
    fn test_scalar_deep_on_path_is_replaced() {
        let refs = record_from_json(json!({"a.b": "x", "a.b.c": 3, "a.d": true})).unwrap();
        let expected = record_from_json(json!({"a": {"b": {"c": 3}, "d": true}})).unwrap();
        assert_eq!(prepare_refs(&refs), expected);
    }
}
