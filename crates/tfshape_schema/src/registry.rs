//! Type registry for named, reusable schemas.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::composite::{NamedSchema, Schema};
use crate::error::{SchemaError, SchemaResult};
use crate::path::FieldPath;

/// A registry of named schemas.
///
/// Registration is append-only. Registering a name again with an identical schema
/// is a no-op; registering a different schema under an existing name is an error.
/// Registered schemas are immutable and shared through `Arc`.
#[derive(Default, Clone)]
pub struct TypeRegistry {
    types: BTreeMap<String, Arc<Schema>>,
}

impl TypeRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// Register a schema, or verify that an identical one is already registered.
    pub fn register(&mut self, name: impl Into<String>, schema: impl Into<Schema>) -> SchemaResult<Arc<Schema>> {
        let name = name.into();
        let schema = schema.into();

        if let Some(existing) = self.types.get(&name) {
            if **existing == schema {
                debug!("Type already registered with identical schema: {}", name);
                return Ok(existing.clone());
            }
            return Err(SchemaError::ConflictingType(name));
        }

        schema.verify(&FieldPath::root().field(name.as_str()))?;
        debug!("Registering type: {}", name);
        let schema = Arc::new(schema);
        self.types.insert(name, schema.clone());
        Ok(schema)
    }

    /// Get a type by name.
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.types.get(name).cloned()
    }

    /// Get a type by name, returning an error if not found.
    pub fn get_required(&self, name: &str) -> SchemaResult<Arc<Schema>> {
        self.get(name)
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// A schema that refers to the registered type `name`.
    pub fn reference(&self, name: &str) -> SchemaResult<Schema> {
        let target = self.get_required(name)?;
        Ok(Schema::Named(NamedSchema::new(name, target)))
    }

    /// Check if a type is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// All registered type names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.types.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Register every type of `other` into this registry.
    pub fn extend(&mut self, other: &TypeRegistry) -> SchemaResult<()> {
        for (name, schema) in &other.types {
            self.register(name.clone(), (**schema).clone())?;
        }
        Ok(())
    }

    /// End the registration pass and share the registry read-only.
    pub fn freeze(self) -> Arc<TypeRegistry> {
        debug!("Freezing type registry with {} type(s)", self.types.len());
        Arc::new(self)
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

static GLOBAL: OnceLock<RwLock<TypeRegistry>> = OnceLock::new();

/// The process-wide registry.
pub fn global() -> &'static RwLock<TypeRegistry> {
    GLOBAL.get_or_init(|| RwLock::new(TypeRegistry::new()))
}

/// Register into the process-wide registry.
pub fn register_global(name: impl Into<String>, schema: impl Into<Schema>) -> SchemaResult<Arc<Schema>> {
    global().write().register(name, schema)
}

/// Look up a type in the process-wide registry.
pub fn lookup_global(name: &str) -> Option<Arc<Schema>> {
    global().read().get(name)
}
