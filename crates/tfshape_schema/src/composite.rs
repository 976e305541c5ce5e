//! Composite schemas: records of named fields, lists and string-keyed maps.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::builder::RecordBuilder;
use crate::constraint::Pattern;
use crate::error::{SchemaError, SchemaResult};
use crate::node::TypeNode;
use crate::path::FieldPath;

/// Whether a value may be absent, and what replaces it when it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Presence {
    pub optional: bool,
    pub default: Option<Value>,
}

impl Presence {
    /// Absence is an error only for non-optional values without a default.
    pub fn is_required(&self) -> bool {
        !self.optional && self.default.is_none()
    }
}

/// Any schema the engine can apply to a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Type(TypeNode),
    Record(RecordSchema),
    List(ListSchema),
    Map(MapSchema),
    Named(NamedSchema),
}

impl Schema {
    pub fn presence(&self) -> &Presence {
        match self {
            Schema::Type(node) => node.presence(),
            Schema::Record(record) => &record.presence,
            Schema::List(list) => &list.presence,
            Schema::Map(map) => &map.presence,
            Schema::Named(named) => &named.presence,
        }
    }

    fn presence_mut(&mut self) -> &mut Presence {
        match self {
            Schema::Type(node) => node.presence_mut(),
            Schema::Record(record) => &mut record.presence,
            Schema::List(list) => &mut list.presence,
            Schema::Map(map) => &mut map.presence,
            Schema::Named(named) => &mut named.presence,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            Schema::Named(named) => named.presence.optional || named.target.is_optional(),
            other => other.presence().optional,
        }
    }

    pub fn default_value(&self) -> Option<&Value> {
        match self {
            Schema::Named(named) => named
                .presence
                .default
                .as_ref()
                .or_else(|| named.target.default_value()),
            other => other.presence().default.as_ref(),
        }
    }

    pub fn is_required(&self) -> bool {
        !self.is_optional() && self.default_value().is_none()
    }

    pub fn optional(mut self) -> Self {
        self.presence_mut().optional = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.presence_mut().default = Some(value.into());
        self
    }

    /// Short name of the schema's shape, used in mismatch messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Schema::Type(node) => node.primitive().as_str(),
            Schema::Record(_) => "map",
            Schema::List(_) => "list",
            Schema::Map(_) => "map",
            Schema::Named(named) => named.target.kind_name(),
        }
    }

    /// Follow named references down to the concrete schema.
    pub fn resolved(&self) -> &Schema {
        match self {
            Schema::Named(named) => named.target.resolved(),
            other => other,
        }
    }

    /// Check the schema definition recursively.
    pub fn verify(&self, path: &FieldPath) -> SchemaResult<()> {
        match self {
            Schema::Type(node) => node.verify(path),
            Schema::Record(record) => record.verify(path),
            Schema::List(list) => list.verify(path),
            Schema::Map(map) => map.verify(path),
            Schema::Named(named) => named.verify(path),
        }
    }
}

impl From<TypeNode> for Schema {
    fn from(node: TypeNode) -> Self {
        Schema::Type(node)
    }
}

impl From<RecordSchema> for Schema {
    fn from(record: RecordSchema) -> Self {
        Schema::Record(record)
    }
}

impl From<ListSchema> for Schema {
    fn from(list: ListSchema) -> Self {
        Schema::List(list)
    }
}

impl From<MapSchema> for Schema {
    fn from(map: MapSchema) -> Self {
        Schema::Map(map)
    }
}

impl From<NamedSchema> for Schema {
    fn from(named: NamedSchema) -> Self {
        Schema::Named(named)
    }
}

/// Checks the default of a composite by building it through the composite itself.
fn verify_default(schema: &Schema, path: &FieldPath) -> SchemaResult<()> {
    let Some(default) = schema.presence().default.as_ref() else {
        return Ok(());
    };
    let mut required = schema.clone();
    required.presence_mut().default = None;
    RecordBuilder::resolve_value(&required, default, path).map_err(|err| {
        SchemaError::InvalidDefault {
            path: path.to_string(),
            message: err.to_string(),
        }
    })?;
    Ok(())
}

/// A map of declared, named fields.
///
/// Records are strict by default: undeclared keys are reported as unknown fields.
/// A lax record passes undeclared keys through unvalidated.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    fields: Vec<(String, Schema)>,
    strict: bool,
    presence: Presence,
    description: Option<String>,
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSchema {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            strict: true,
            presence: Presence::default(),
            description: None,
        }
    }

    /// Declare a field. Declaration order is the order of the built record.
    pub fn field(mut self, name: impl Into<String>, schema: impl Into<Schema>) -> Self {
        self.fields.push((name.into(), schema.into()));
        self
    }

    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    pub fn lax(mut self) -> Self {
        self.strict = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.presence.optional = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.presence.default = Some(value.into());
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.fields.iter().map(|(name, schema)| (name.as_str(), schema))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn get_field(&self, name: &str) -> Option<&Schema> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, schema)| schema)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.get_field(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn verify(&self, path: &FieldPath) -> SchemaResult<()> {
        let mut seen = HashSet::new();
        for (name, schema) in &self.fields {
            if !seen.insert(name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    path: if path.is_root() {
                        "<root>".to_string()
                    } else {
                        path.to_string()
                    },
                    field: name.clone(),
                });
            }
            schema.verify(&path.field(name))?;
        }
        verify_default(&Schema::Record(self.clone()), path)
    }
}

/// A list whose elements all share one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSchema {
    element: Box<Schema>,
    min_size: Option<usize>,
    max_size: Option<usize>,
    presence: Presence,
}

impl ListSchema {
    pub fn of(element: impl Into<Schema>) -> Self {
        Self {
            element: Box::new(element.into()),
            min_size: None,
            max_size: None,
            presence: Presence::default(),
        }
    }

    pub fn min_size(mut self, min: usize) -> Self {
        self.min_size = Some(min);
        self
    }

    pub fn max_size(mut self, max: usize) -> Self {
        self.max_size = Some(max);
        self
    }

    pub fn non_empty(self) -> Self {
        self.min_size(1)
    }

    pub fn optional(mut self) -> Self {
        self.presence.optional = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.presence.default = Some(value.into());
        self
    }

    pub fn element(&self) -> &Schema {
        &self.element
    }

    pub fn size_bounds(&self) -> (Option<usize>, Option<usize>) {
        (self.min_size, self.max_size)
    }

    pub fn verify(&self, path: &FieldPath) -> SchemaResult<()> {
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min > max {
                return Err(SchemaError::InvalidRange {
                    path: path.to_string(),
                    min: min as f64,
                    max: max as f64,
                });
            }
        }
        self.element.verify(&path.index(0))?;
        verify_default(&Schema::List(self.clone()), path)
    }
}

/// A string-keyed map (e.g. resource tags) whose values share one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSchema {
    values: Box<Schema>,
    key_pattern: Option<Pattern>,
    max_key_length: Option<usize>,
    max_entries: Option<usize>,
    presence: Presence,
}

impl MapSchema {
    pub fn of(values: impl Into<Schema>) -> Self {
        Self {
            values: Box::new(values.into()),
            key_pattern: None,
            max_key_length: None,
            max_entries: None,
            presence: Presence::default(),
        }
    }

    pub fn key_format(mut self, pattern: &str) -> SchemaResult<Self> {
        self.key_pattern = Some(Pattern::new(pattern)?);
        Ok(self)
    }

    pub fn max_key_length(mut self, max: usize) -> Self {
        self.max_key_length = Some(max);
        self
    }

    pub fn max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    pub fn optional(mut self) -> Self {
        self.presence.optional = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.presence.default = Some(value.into());
        self
    }

    pub fn values(&self) -> &Schema {
        &self.values
    }

    pub fn key_pattern(&self) -> Option<&Pattern> {
        self.key_pattern.as_ref()
    }

    pub fn max_key_length_limit(&self) -> Option<usize> {
        self.max_key_length
    }

    pub fn max_entries_limit(&self) -> Option<usize> {
        self.max_entries
    }

    pub fn verify(&self, path: &FieldPath) -> SchemaResult<()> {
        self.values.verify(&path.field("*"))?;
        verify_default(&Schema::Map(self.clone()), path)
    }
}

/// A reference to a schema held by a [`crate::TypeRegistry`].
///
/// Presence set on the reference applies at the usage site and takes precedence
/// over the registered schema's own.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSchema {
    name: String,
    target: Arc<Schema>,
    presence: Presence,
}

impl NamedSchema {
    pub fn new(name: impl Into<String>, target: Arc<Schema>) -> Self {
        Self {
            name: name.into(),
            target,
            presence: Presence::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Schema {
        &self.target
    }

    pub fn verify(&self, path: &FieldPath) -> SchemaResult<()> {
        if let Some(default) = self.presence.default.as_ref() {
            RecordBuilder::resolve_value(&self.target, default, path).map_err(|err| {
                SchemaError::InvalidDefault {
                    path: path.to_string(),
                    message: err.to_string(),
                }
            })?;
        }
        Ok(())
    }
}
