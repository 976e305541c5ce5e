//! Record construction from raw attribute maps.

use serde_json::{Map, Value};
use tracing::debug;

use crate::composite::{ListSchema, MapSchema, RecordSchema, Schema};
use crate::constraint::CustomContext;
use crate::evaluator::ConstraintEvaluator;
use crate::node::describe_value;
use crate::path::FieldPath;
use crate::record::Record;
use crate::violation::{ValidationError, ValidationReport, Violation};

/// Applies a [`RecordSchema`] to a raw input map.
///
/// Every declared field is checked independently and all violations are returned
/// together. A [`Record`] is only produced when no violation was found.
pub struct RecordBuilder<'s> {
    schema: &'s RecordSchema,
}

impl<'s> RecordBuilder<'s> {
    pub fn new(schema: &'s RecordSchema) -> Self {
        Self { schema }
    }

    pub fn build(&self, raw: &Value) -> Result<Record, ValidationError> {
        let mut report = ValidationReport::new();
        let root = FieldPath::root();

        let built = match raw.as_object() {
            Some(object) => build_fields(self.schema, object, &root, &mut report),
            None => {
                report.add(Violation::type_mismatch(root, "map", describe_value(raw)));
                None
            }
        };

        if !report.is_valid() {
            debug!("Record rejected with {} violation(s)", report.len());
            return Err(ValidationError::new(report.violations().to_vec()));
        }

        let (values, extra) = built.unwrap_or_default();
        debug!(
            "Record built with {} field(s) and {} pass-through key(s)",
            values.len(),
            extra.len()
        );
        Ok(Record::new(values, extra))
    }

    /// Validate a present value against any schema, rooted at `path`.
    ///
    /// Used for checking composite defaults and for validating standalone values.
    pub fn resolve_value(schema: &Schema, value: &Value, path: &FieldPath) -> Result<Value, ValidationError> {
        let mut report = ValidationReport::new();
        let siblings = Map::new();
        let resolved = resolve_present(schema, value, path, &siblings, &mut report);
        match resolved {
            Some(value) if report.is_valid() => Ok(value),
            _ => Err(ValidationError::new(report.violations().to_vec())),
        }
    }
}

/// `name` and `:name` identify the same field.
pub fn canonical_key(key: &str) -> &str {
    key.strip_prefix(':').unwrap_or(key)
}

/// Normalize keys, reporting keys given in both forms.
fn normalize_keys<'v>(
    object: &'v Map<String, Value>,
    path: &FieldPath,
    report: &mut ValidationReport,
) -> Vec<(&'v str, &'v Value)> {
    let mut entries: Vec<(&str, &Value)> = Vec::with_capacity(object.len());
    for (key, value) in object {
        let canonical = canonical_key(key);
        if entries.iter().any(|(seen, _)| *seen == canonical) {
            report.add(Violation::constraint(
                path.field(canonical),
                format!("given both as '{}' and ':{}'", canonical, canonical),
            ));
            continue;
        }
        entries.push((canonical, value));
    }
    entries
}

fn lookup<'v>(entries: &[(&str, &'v Value)], name: &str) -> Option<&'v Value> {
    entries.iter().find(|(key, _)| *key == name).map(|(_, value)| *value)
}

/// Build the declared fields of `schema`, returning declared values and pass-through
/// keys. `None` when anything below failed.
fn build_fields(
    schema: &RecordSchema,
    object: &Map<String, Value>,
    path: &FieldPath,
    report: &mut ValidationReport,
) -> Option<(Map<String, Value>, Map<String, Value>)> {
    let before = report.len();
    let entries = normalize_keys(object, path, report);

    let mut values = Map::new();
    for (name, field_schema) in schema.fields() {
        let child = path.field(name);
        if let Some(value) = resolve(field_schema, lookup(&entries, name), &child, &values, report) {
            values.insert(name.to_string(), value);
        }
    }

    let mut extra = Map::new();
    for (key, value) in &entries {
        if schema.has_field(key) {
            continue;
        }
        if schema.is_strict() {
            report.add(Violation::unknown_field(path.field(*key)));
        } else {
            extra.insert(key.to_string(), (*value).clone());
        }
    }

    (report.len() == before).then_some((values, extra))
}

/// Resolve a possibly absent value. Explicit `null` counts as absent.
fn resolve(
    schema: &Schema,
    raw: Option<&Value>,
    path: &FieldPath,
    siblings: &Map<String, Value>,
    report: &mut ValidationReport,
) -> Option<Value> {
    match raw.filter(|v| !v.is_null()) {
        Some(value) => resolve_present(schema, value, path, siblings, report),
        None => match schema.default_value() {
            Some(default) => resolve_present(schema, default, path, siblings, report),
            None => {
                if !schema.is_optional() {
                    report.add(Violation::missing(path.clone()));
                }
                None
            }
        },
    }
}

fn resolve_present(
    schema: &Schema,
    value: &Value,
    path: &FieldPath,
    siblings: &Map<String, Value>,
    report: &mut ValidationReport,
) -> Option<Value> {
    match schema {
        Schema::Type(node) => {
            let ctx = CustomContext::new(path, siblings);
            match ConstraintEvaluator::evaluate(node, value, &ctx) {
                Ok(value) => Some(value),
                Err(violation) => {
                    report.add(violation);
                    None
                }
            }
        }
        Schema::Record(record) => {
            let Some(object) = value.as_object() else {
                report.add(Violation::type_mismatch(path.clone(), "map", describe_value(value)));
                return None;
            };
            let (mut values, extra) = build_fields(record, object, path, report)?;
            values.extend(extra);
            Some(Value::Object(values))
        }
        Schema::List(list) => resolve_list(list, value, path, siblings, report),
        Schema::Map(map) => resolve_map(map, value, path, siblings, report),
        Schema::Named(named) => resolve_present(named.target(), value, path, siblings, report),
    }
}

fn resolve_list(
    list: &ListSchema,
    value: &Value,
    path: &FieldPath,
    siblings: &Map<String, Value>,
    report: &mut ValidationReport,
) -> Option<Value> {
    let Some(items) = value.as_array() else {
        report.add(Violation::type_mismatch(path.clone(), "list", describe_value(value)));
        return None;
    };
    let before = report.len();

    let (min, max) = list.size_bounds();
    if let Some(min) = min {
        if items.len() < min {
            report.add(Violation::constraint(
                path.clone(),
                format!("must contain at least {} item(s), got {}", min, items.len()),
            ));
        }
    }
    if let Some(max) = max {
        if items.len() > max {
            report.add(Violation::constraint(
                path.clone(),
                format!("must contain at most {} item(s), got {}", max, items.len()),
            ));
        }
    }

    // Positions are kept: a null element takes the element default or is reported.
    let element = list.element();
    let mut built = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let child = path.index(index);
        if item.is_null() && element.default_value().is_none() {
            report.add(Violation::type_mismatch(child, element.kind_name(), "null"));
            continue;
        }
        if let Some(value) = resolve(element, Some(item), &child, siblings, report) {
            built.push(value);
        }
    }

    (report.len() == before).then_some(Value::Array(built))
}

fn resolve_map(
    map: &MapSchema,
    value: &Value,
    path: &FieldPath,
    siblings: &Map<String, Value>,
    report: &mut ValidationReport,
) -> Option<Value> {
    let Some(object) = value.as_object() else {
        report.add(Violation::type_mismatch(path.clone(), "map", describe_value(value)));
        return None;
    };
    let before = report.len();
    let entries = normalize_keys(object, path, report);

    if let Some(max) = map.max_entries_limit() {
        if entries.len() > max {
            report.add(Violation::constraint(
                path.clone(),
                format!("must contain at most {} entries, got {}", max, entries.len()),
            ));
        }
    }

    let mut built = Map::new();
    for (key, item) in entries {
        let child = path.field(key);
        if let Some(pattern) = map.key_pattern() {
            if !pattern.is_match(key) {
                report.add(Violation::constraint(
                    child,
                    format!("key must match format /{}/", pattern.as_str()),
                ));
                continue;
            }
        }
        if let Some(max) = map.max_key_length_limit() {
            if key.chars().count() > max {
                report.add(Violation::constraint(
                    child,
                    format!("key length must be at most {}", max),
                ));
                continue;
            }
        }
        if let Some(value) = resolve(map.values(), Some(item), &child, siblings, report) {
            built.insert(key.to_string(), value);
        }
    }

    (report.len() == before).then_some(Value::Object(built))
}
