//! Schema documents: named types declared in YAML, JSON or TOML.
//!
//! A document is a `types` table mapping type names to declarations:
//!
//! ```yaml
//! types:
//!   Port:
//!     type: integer
//!     range: { min: 0, max: 65535 }
//!   IngressRule:
//!     type: record
//!     fields:
//!       from_port: { ref: Port }
//!       to_port: { ref: Port }
//!       protocol:
//!         type: string
//!         custom: [lowercase]
//!         enum: [tcp, udp, icmp, "-1"]
//!       cidr_blocks:
//!         type: list
//!         optional: true
//!         element: { type: string, custom: [cidr] }
//! ```
//!
//! Field order is kept for YAML and JSON documents. TOML tables are read in key
//! order. Constraints of a scalar declaration run in a fixed order: custom stages
//! first (so normalizing stages feed the rest), then `enum`, `format`, size limits
//! and finally `range`.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::builtin::CustomLibrary;
use crate::composite::{ListSchema, MapSchema, NamedSchema, RecordSchema, Schema};
use crate::constraint::{Constraint, Range};
use crate::error::{SchemaError, SchemaResult};
use crate::node::{Primitive, TypeNode};
use crate::registry::TypeRegistry;

/// Serialization format of a schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> SchemaResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(DocumentFormat::Yaml),
            "json" => Ok(DocumentFormat::Json),
            "toml" => Ok(DocumentFormat::Toml),
            other => Err(SchemaError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Bounds of a numeric declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeDecl {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub exclusive: bool,
}

/// Declaration of one schema inside a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDecl {
    /// `string`, `integer`, `float`, `bool`, `record`, `list` or `map`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Name of another registered type.
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
    #[serde(rename = "enum", default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub range: Option<RangeDecl>,
    #[serde(default)]
    pub min_size: Option<usize>,
    #[serde(default)]
    pub max_size: Option<usize>,
    /// Names of custom stages from the loader's library.
    #[serde(default)]
    pub custom: Vec<String>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    /// Records only; defaults to strict.
    #[serde(default)]
    pub strict: Option<bool>,
    /// Records only; field name to declaration.
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
    /// Lists only.
    #[serde(default)]
    pub element: Option<Box<SchemaDecl>>,
    /// Maps only; schema of the values.
    #[serde(default)]
    pub value: Option<Box<SchemaDecl>>,
    /// Maps only.
    #[serde(default)]
    pub key_format: Option<String>,
}

/// A parsed schema document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub types: Map<String, Value>,
}

impl SchemaDocument {
    pub fn parse(text: &str, format: DocumentFormat) -> SchemaResult<Self> {
        let document: SchemaDocument = match format {
            DocumentFormat::Yaml => serde_yaml::from_str(text)?,
            DocumentFormat::Json => serde_json::from_str(text)?,
            DocumentFormat::Toml => toml::from_str(text)?,
        };
        Ok(document)
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(|s| s.as_str()).collect()
    }

    fn decl(&self, name: &str) -> Option<SchemaResult<SchemaDecl>> {
        self.types.get(name).map(|raw| parse_decl(name, raw))
    }
}

fn parse_decl(name: &str, raw: &Value) -> SchemaResult<SchemaDecl> {
    serde_json::from_value(raw.clone()).map_err(|e| SchemaError::InvalidDeclaration {
        name: name.to_string(),
        message: e.to_string(),
    })
}

fn invalid(name: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::InvalidDeclaration {
        name: name.to_string(),
        message: message.into(),
    }
}

/// Compiles schema documents into a [`TypeRegistry`].
pub struct SchemaLoader {
    library: CustomLibrary,
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaLoader {
    /// Loader with the built-in custom stages.
    pub fn new() -> Self {
        Self {
            library: CustomLibrary::builtin(),
        }
    }

    pub fn with_library(library: CustomLibrary) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &CustomLibrary {
        &self.library
    }

    /// Load a document file; the format follows the extension.
    pub fn load_file(&self, path: impl AsRef<Path>, registry: &mut TypeRegistry) -> SchemaResult<Vec<String>> {
        let path = path.as_ref();
        info!("Loading schema document {:?}", path);
        let format = DocumentFormat::from_path(path)?;
        let text = std::fs::read_to_string(path)?;
        self.load_str(&text, format, registry)
    }

    pub fn load_str(
        &self,
        text: &str,
        format: DocumentFormat,
        registry: &mut TypeRegistry,
    ) -> SchemaResult<Vec<String>> {
        let document = SchemaDocument::parse(text, format)?;
        self.load_document(&document, registry)
    }

    /// Register every type of `document`, returning the names in document order.
    ///
    /// References may point at types declared later in the same document or at
    /// types already present in `registry`.
    pub fn load_document(&self, document: &SchemaDocument, registry: &mut TypeRegistry) -> SchemaResult<Vec<String>> {
        let mut stack = Vec::new();
        let mut names = Vec::with_capacity(document.types.len());
        for name in document.types.keys() {
            self.register_named(document, name, registry, &mut stack)?;
            names.push(name.clone());
        }
        debug!("Loaded {} type(s) from schema document", names.len());
        Ok(names)
    }

    /// Compile a standalone declaration against the types in `registry`.
    pub fn compile(&self, name: &str, decl: &SchemaDecl, registry: &mut TypeRegistry) -> SchemaResult<Schema> {
        let empty = SchemaDocument::default();
        self.compile_decl(&empty, name, decl, registry, &mut Vec::new())
    }

    fn register_named(
        &self,
        document: &SchemaDocument,
        name: &str,
        registry: &mut TypeRegistry,
        stack: &mut Vec<String>,
    ) -> SchemaResult<Arc<Schema>> {
        if stack.iter().any(|n| n == name) {
            return Err(SchemaError::CircularReference(name.to_string()));
        }
        let Some(decl) = document.decl(name) else {
            return registry.get_required(name);
        };
        let decl = decl?;

        stack.push(name.to_string());
        let schema = self.compile_decl(document, name, &decl, registry, stack);
        stack.pop();

        registry.register(name, schema?)
    }

    fn compile_decl(
        &self,
        document: &SchemaDocument,
        name: &str,
        decl: &SchemaDecl,
        registry: &mut TypeRegistry,
        stack: &mut Vec<String>,
    ) -> SchemaResult<Schema> {
        let mut schema = match (&decl.reference, decl.kind.as_deref()) {
            (Some(_), Some(_)) => return Err(invalid(name, "'ref' and 'type' cannot both be set")),
            (Some(reference), None) => {
                let target = self.register_named(document, reference, registry, stack)?;
                Schema::Named(NamedSchema::new(reference.as_str(), target))
            }
            (None, Some("record")) => self.compile_record(document, name, decl, registry, stack)?,
            (None, Some("list")) => {
                let element = decl
                    .element
                    .as_deref()
                    .ok_or_else(|| invalid(name, "list declarations need an 'element'"))?;
                let element = self.compile_decl(document, &format!("{}[]", name), element, registry, stack)?;
                let mut list = ListSchema::of(element);
                if let Some(min) = decl.min_size {
                    list = list.min_size(min);
                }
                if let Some(max) = decl.max_size {
                    list = list.max_size(max);
                }
                Schema::List(list)
            }
            (None, Some("map")) => {
                let value = decl
                    .value
                    .as_deref()
                    .ok_or_else(|| invalid(name, "map declarations need a 'value'"))?;
                let value = self.compile_decl(document, &format!("{}.*", name), value, registry, stack)?;
                let mut map = MapSchema::of(value);
                if let Some(pattern) = &decl.key_format {
                    map = map.key_format(pattern)?;
                }
                if let Some(max) = decl.max_size {
                    map = map.max_entries(max);
                }
                Schema::Map(map)
            }
            (None, Some(kind)) => {
                let primitive =
                    Primitive::from_str(kind).ok_or_else(|| invalid(name, format!("unknown type '{}'", kind)))?;
                Schema::Type(self.compile_node(name, primitive, decl)?)
            }
            (None, None) => return Err(invalid(name, "either 'type' or 'ref' is required")),
        };

        if decl.optional {
            schema = schema.optional();
        }
        if let Some(default) = &decl.default {
            schema = schema.with_default(default.clone());
        }
        Ok(schema)
    }

    fn compile_record(
        &self,
        document: &SchemaDocument,
        name: &str,
        decl: &SchemaDecl,
        registry: &mut TypeRegistry,
        stack: &mut Vec<String>,
    ) -> SchemaResult<Schema> {
        let mut record = RecordSchema::new();
        if decl.strict == Some(false) {
            record = record.lax();
        }
        if let Some(description) = &decl.description {
            record = record.describe(description.clone());
        }
        for (field, raw) in decl.fields.iter().flatten() {
            let qualified = format!("{}.{}", name, field);
            let field_decl = parse_decl(&qualified, raw)?;
            let schema = self.compile_decl(document, &qualified, &field_decl, registry, stack)?;
            record = record.field(field.clone(), schema);
        }
        Ok(Schema::Record(record))
    }

    fn compile_node(&self, name: &str, primitive: Primitive, decl: &SchemaDecl) -> SchemaResult<TypeNode> {
        let mut node = TypeNode::new(primitive);
        for custom in &decl.custom {
            node = node.custom(self.library.get_required(custom)?);
        }
        if let Some(allowed) = &decl.allowed {
            node = node.included_in(allowed.iter().cloned());
        }
        if let Some(format) = &decl.format {
            node = node.format(format)?;
        }
        if decl.min_size.is_some() || decl.max_size.is_some() {
            node = node.constrain(Constraint::Size {
                min: decl.min_size,
                max: decl.max_size,
            });
        }
        if let Some(range) = &decl.range {
            if range.min.is_none() && range.max.is_none() {
                return Err(invalid(name, "'range' needs 'min' or 'max'"));
            }
            node = node.bounded(Range {
                min: range.min,
                max: range.max,
                exclusive_min: range.exclusive && range.min.is_some(),
                exclusive_max: range.exclusive && range.max.is_some(),
            });
        }
        if let Some(description) = &decl.description {
            node = node.describe(description.clone());
        }
        Ok(node)
    }
}
