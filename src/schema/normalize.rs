//! Record normalization against a [`Schema`].

use log::trace;

use super::types::Schema;
use crate::coercion::{coerce, zero_value};
use crate::value::{Record, Value};

impl Schema {
    /// Produces the canonical form of `raw`.
    ///
    /// Only fields declared in the schema and present in `raw` are carried
    /// over. A nullable field holding null is left out. When coercion fails,
    /// scalar fields are stored as their zero value while `time`, `map` and
    /// `array` fields are left out. Normalizing a canonical record yields the
    /// same record.
    pub fn normalize(&self, raw: &Record) -> Record {
        let mut normalized = Record::new();

        for (field_name, definition) in &self.fields {
            let Some(value) = raw.get(field_name) else {
                continue;
            };

            match coerce(definition, value) {
                Ok(Some(coerced)) => {
                    normalized.insert(field_name.clone(), coerced);
                }
                Ok(None) => {}
                Err(_) => match zero_value(&definition.field_type) {
                    Some(zero) => {
                        trace!(
                            "Field '{}' could not be read as {}, storing zero value",
                            field_name,
                            definition.field_type.name()
                        );
                        normalized.insert(field_name.clone(), zero);
                    }
                    None => {
                        trace!(
                            "Field '{}' could not be read as {}, omitting",
                            field_name,
                            definition.field_type.name()
                        );
                    }
                },
            }
        }

        normalized
    }

    /// Normalizes a value that is expected to be a record. Anything else
    /// normalizes to an empty record.
    pub fn normalize_value(&self, raw: &Value) -> Record {
        raw.as_map()
            .map(|record| self.normalize(record))
            .unwrap_or_default()
    }
}
