//! Validated, immutable records.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// The result of applying a record schema to raw input.
///
/// Declared fields keep declaration order and include applied defaults. Keys a lax
/// schema did not declare are kept apart in [`Record::extra`]. Records expose no
/// mutation; a new input always produces a new record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Map<String, Value>,
    extra: Map<String, Value>,
}

impl Record {
    pub(crate) fn new(values: Map<String, Value>, extra: Map<String, Value>) -> Self {
        Self { values, extra }
    }

    /// Value of a declared field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Whether a declared field holds a value.
    pub fn contains(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(|v| !v.is_null())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_list(&self, name: &str) -> Option<&Vec<Value>> {
        self.get(name).and_then(Value::as_array)
    }

    pub fn get_map(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).and_then(Value::as_object)
    }

    /// Look up a nested value by dotted path, e.g. `alias.zone_id` or `records.0`.
    pub fn lookup(&self, dotted: &str) -> Option<&Value> {
        let mut parts = dotted.split('.');
        let first = parts.next()?;
        let mut current = self.values.get(first).or_else(|| self.extra.get(first))?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current).filter(|v| !v.is_null())
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Keys passed through by a lax schema, unvalidated.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Flat attribute view handed to the synthesizer: declared fields (defaults
    /// included) followed by pass-through keys.
    pub fn to_attribute_map(&self) -> Map<String, Value> {
        let mut attributes = self.values.clone();
        for (key, value) in &self.extra {
            attributes.entry(key.clone()).or_insert_with(|| value.clone());
        }
        attributes
    }

    pub fn into_attribute_map(self) -> Map<String, Value> {
        let mut attributes = self.values;
        for (key, value) in self.extra {
            attributes.entry(key).or_insert(value);
        }
        attributes
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_attribute_map().serialize(serializer)
    }
}
