//! Error types for resource definitions.

use thiserror::Error;

use tfshape_schema::{SchemaError, ValidationError};

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors that can occur while defining or validating resources.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Property '{name}' of {resource_type} conflicts: {reason}")]
    PropertyConflict {
        resource_type: String,
        name: String,
        reason: String,
    },

    #[error("Invalid resolve context: {0}")]
    InvalidContext(String),

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
