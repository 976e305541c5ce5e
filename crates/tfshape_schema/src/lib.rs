//! # tfshape_schema
//!
//! Schema validation and constraint engine for infrastructure resource attributes.
//!
//! A resource definition hands this crate an untyped attribute map together with a
//! declarative schema. The engine checks every declared field, fills defaults and
//! returns either an immutable [`Record`] or the complete list of [`Violation`]s.
//!
//! ## Features
//!
//! - **Type Nodes**: scalar, enum and constrained values with optional defaults
//! - **Composite Schemas**: records, lists and string-keyed maps, strict or lax
//! - **Constraints**: anchored formats, inclusive/exclusive ranges, membership, sizes
//!   and named custom stages that may normalize the value
//! - **Type Registry**: named, reusable schemas with register-or-verify semantics
//! - **Schema Documents**: named types declared in YAML, JSON or TOML
//! - **Walker**: visitor-driven traversal of a validated record
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use tfshape_schema::{RecordBuilder, RecordSchema, TypeNode};
//!
//! let schema = RecordSchema::new()
//!     .field("domain", TypeNode::string_enum(["vpc", "standard"]).with_default("vpc"))
//!     .field("weight", TypeNode::integer().range(0, 255).optional());
//!
//! let record = RecordBuilder::new(&schema).build(&json!({ "weight": 10 })).unwrap();
//! assert_eq!(record.get_str("domain"), Some("vpc"));
//!
//! let err = RecordBuilder::new(&schema).build(&json!({ "weight": 256 })).unwrap_err();
//! assert_eq!(err.violations()[0].path.to_string(), "weight");
//! ```

pub mod builder;
pub mod builtin;
pub mod composite;
pub mod constraint;
pub mod error;
pub mod evaluator;
pub mod loader;
pub mod node;
pub mod path;
pub mod record;
pub mod registry;
pub mod testing;
pub mod violation;
pub mod walker;

pub use builder::RecordBuilder;
pub use builtin::CustomLibrary;
pub use composite::{ListSchema, MapSchema, NamedSchema, Presence, RecordSchema, Schema};
pub use constraint::{Constraint, CustomConstraint, CustomContext, Pattern, Range};
pub use error::{SchemaError, SchemaResult};
pub use evaluator::ConstraintEvaluator;
pub use loader::{DocumentFormat, SchemaDecl, SchemaDocument, SchemaLoader};
pub use node::{NodeKind, Primitive, TypeNode};
pub use path::{FieldPath, PathSegment};
pub use record::Record;
pub use registry::TypeRegistry;
pub use violation::{ErrorKind, ValidationError, ValidationReport, Violation};
pub use walker::{flatten, walk, FlattenVisitor, SchemaVisitor};
