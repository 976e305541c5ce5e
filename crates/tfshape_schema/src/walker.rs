//! Schema-driven traversal of validated values.

use serde_json::{Map, Value};

use crate::composite::{RecordSchema, Schema};
use crate::path::FieldPath;
use crate::record::Record;

/// Callbacks invoked by [`walk`].
///
/// `enter_field` and `leave_field` bracket every declared field, list element and
/// map entry. `record_value` reports each leaf value together with its location.
#[cfg_attr(test, mockall::automock)]
pub trait SchemaVisitor {
    fn enter_field(&mut self, path: &FieldPath, schema: &Schema);
    fn leave_field(&mut self, path: &FieldPath);
    fn record_value(&mut self, path: &FieldPath, value: &Value);
}

/// Walk a record's declared fields in declaration order.
///
/// Fields absent from the record are entered and left without a value. Pass-through
/// keys of lax schemas are not visited.
pub fn walk<V: SchemaVisitor + ?Sized>(schema: &RecordSchema, record: &Record, visitor: &mut V) {
    walk_fields(schema, record.values(), &FieldPath::root(), visitor);
}

fn walk_fields<V: SchemaVisitor + ?Sized>(
    schema: &RecordSchema,
    values: &Map<String, Value>,
    path: &FieldPath,
    visitor: &mut V,
) {
    for (name, field) in schema.fields() {
        let child = path.field(name);
        visitor.enter_field(&child, field);
        if let Some(value) = values.get(name).filter(|v| !v.is_null()) {
            walk_value(field, value, &child, visitor);
        }
        visitor.leave_field(&child);
    }
}

fn walk_value<V: SchemaVisitor + ?Sized>(schema: &Schema, value: &Value, path: &FieldPath, visitor: &mut V) {
    match (schema, value) {
        (Schema::Type(_), value) => visitor.record_value(path, value),
        (Schema::Record(record), Value::Object(values)) => walk_fields(record, values, path, visitor),
        (Schema::List(list), Value::Array(items)) => {
            for (index, item) in items.iter().enumerate() {
                let child = path.index(index);
                visitor.enter_field(&child, list.element());
                walk_value(list.element(), item, &child, visitor);
                visitor.leave_field(&child);
            }
        }
        (Schema::Map(map), Value::Object(entries)) => {
            for (key, item) in entries {
                let child = path.field(key.as_str());
                visitor.enter_field(&child, map.values());
                walk_value(map.values(), item, &child, visitor);
                visitor.leave_field(&child);
            }
        }
        (Schema::Named(named), value) => walk_value(named.target(), value, path, visitor),
        // A validated record always matches its schema; anything else is reported
        // as an opaque leaf.
        (_, value) => visitor.record_value(path, value),
    }
}

/// Collects leaf values under their rendered paths.
#[derive(Debug, Default)]
pub struct FlattenVisitor {
    entries: Vec<(String, Value)>,
}

impl FlattenVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_entries(self) -> Vec<(String, Value)> {
        self.entries
    }
}

impl SchemaVisitor for FlattenVisitor {
    fn enter_field(&mut self, _path: &FieldPath, _schema: &Schema) {}

    fn leave_field(&mut self, _path: &FieldPath) {}

    fn record_value(&mut self, path: &FieldPath, value: &Value) {
        self.entries.push((path.to_string(), value.clone()));
    }
}

/// Leaf attribute addresses of a record, e.g. `alias.zone_id` or `records[0]`.
pub fn flatten(schema: &RecordSchema, record: &Record) -> Vec<(String, Value)> {
    let mut visitor = FlattenVisitor::new();
    walk(schema, record, &mut visitor);
    visitor.into_entries()
}
