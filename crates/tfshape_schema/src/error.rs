//! Error types for schema definition.
//!
//! These errors describe mistakes in a schema itself and surface when a schema is
//! verified, registered or loaded from a document. Problems with the *input* being
//! validated are reported as [`crate::Violation`]s instead.

use thiserror::Error;

/// Result type alias for schema definition operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while defining, registering or loading schemas.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid format pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Default for '{path}' does not satisfy its own schema: {message}")]
    InvalidDefault { path: String, message: String },

    #[error("Invalid range for '{path}': min {min} exceeds max {max}")]
    InvalidRange { path: String, min: f64, max: f64 },

    #[error("Duplicate field '{field}' in '{path}'")]
    DuplicateField { path: String, field: String },

    #[error("Constraint '{constraint}' cannot apply to a {primitive} value at '{path}'")]
    IncompatibleConstraint {
        path: String,
        constraint: String,
        primitive: String,
    },

    #[error("Type '{0}' is already registered with a different definition")]
    ConflictingType(String),

    #[error("Type not found: {0}")]
    UnknownType(String),

    #[error("Custom constraint not found: {0}")]
    UnknownCustom(String),

    #[error("Circular type reference involving '{0}'")]
    CircularReference(String),

    #[error("Invalid declaration for '{name}': {message}")]
    InvalidDeclaration { name: String, message: String },

    #[error("Unsupported schema document format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}
