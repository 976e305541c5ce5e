//! # tfshape_resource
//!
//! Resource-level validation on top of [`tfshape_schema`].
//!
//! This crate provides:
//! - **Cross-field rules**: mutual exclusivity, conditional requirements, dependent
//!   fields and at-least/exactly-one-of, evaluated after field validation
//! - **Computed properties**: flags, categories with explicit precedence, scores and
//!   identifiers such as ARNs, memoized per validated resource
//! - **Resource definitions**: schema + rules + properties for one resource type
//! - **Resolve context**: partition, region and account used for identifiers
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use tfshape_resource::{CrossFieldRule, ResourceDefinition};
//! use tfshape_schema::{ErrorKind, RecordSchema, TypeNode};
//!
//! let schema = RecordSchema::new()
//!     .field("instance", TypeNode::string().optional())
//!     .field("network_interface", TypeNode::string().optional());
//! let eip = ResourceDefinition::new("aws_eip", schema)
//!     .unwrap()
//!     .with_rule(CrossFieldRule::mutually_exclusive(["instance", "network_interface"]));
//!
//! assert!(eip.validate(&json!({ "instance": "i-0abc" })).is_ok());
//!
//! let err = eip
//!     .validate(&json!({ "instance": "i-0abc", "network_interface": "eni-0abc" }))
//!     .unwrap_err();
//! assert!(err.has_kind(ErrorKind::CrossFieldViolation));
//! ```

pub mod computed;
pub mod context;
pub mod definition;
pub mod error;
pub mod rules;

pub use computed::{ArnTemplate, Classifier, ComputedProperty, PropertySet, PropertyValue};
pub use context::{Partition, ResolveContext};
pub use definition::{ResourceDefinition, ValidatedResource};
pub use error::{ResourceError, ResourceResult};
pub use rules::{Condition, CrossFieldRule, Requirement, RuleSet};
