//! Structured validation failures.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::FieldPath;

/// Category of a [`Violation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required field was absent or null.
    MissingRequiredField,
    /// The value has the wrong primitive or structural type.
    TypeMismatch,
    /// A format, range, membership or size constraint failed.
    ConstraintViolation,
    /// A strict schema received a key it does not declare.
    UnknownField,
    /// A record-level rule spanning several fields failed.
    CrossFieldViolation,
    /// A named custom stage rejected the value.
    CustomValidationFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingRequiredField => "missing_required_field",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::ConstraintViolation => "constraint_violation",
            ErrorKind::UnknownField => "unknown_field",
            ErrorKind::CrossFieldViolation => "cross_field_violation",
            ErrorKind::CustomValidationFailure => "custom_validation_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single problem found in an input value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Violation {
    pub path: FieldPath,
    pub kind: ErrorKind,
    pub message: String,
}

impl Violation {
    pub fn new(path: FieldPath, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    pub fn missing(path: FieldPath) -> Self {
        Self::new(path, ErrorKind::MissingRequiredField, "is required")
    }

    pub fn type_mismatch(path: FieldPath, expected: &str, found: &str) -> Self {
        Self::new(
            path,
            ErrorKind::TypeMismatch,
            format!("expected {}, got {}", expected, found),
        )
    }

    pub fn constraint(path: FieldPath, message: impl Into<String>) -> Self {
        Self::new(path, ErrorKind::ConstraintViolation, message)
    }

    pub fn unknown_field(path: FieldPath) -> Self {
        Self::new(path, ErrorKind::UnknownField, "is not a recognized attribute")
    }

    pub fn cross_field(path: FieldPath, message: impl Into<String>) -> Self {
        Self::new(path, ErrorKind::CrossFieldViolation, message)
    }

    pub fn custom(path: FieldPath, message: impl Into<String>) -> Self {
        Self::new(path, ErrorKind::CustomValidationFailure, message)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{} [{}]", self.message, self.kind)
        } else {
            write!(f, "{}: {} [{}]", self.path, self.message, self.kind)
        }
    }
}

/// Accumulates violations across independent fields.
#[derive(Debug, Default, Clone)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            violations: Vec::new(),
        }
    }

    pub fn add(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.violations.extend(other.violations);
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Return `value` when nothing was reported, otherwise the aggregated error.
    pub fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.violations.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError::new(self.violations))
        }
    }
}

/// Every violation found in one validation call, surfaced as a single error.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", render(.violations))]
pub struct ValidationError {
    violations: Vec<Violation>,
}

fn render(violations: &[Violation]) -> String {
    let mut text = format!("{} validation error(s):", violations.len());
    for violation in violations {
        text.push_str("\n  - ");
        text.push_str(&violation.to_string());
    }
    text
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }

    /// Violations whose rendered path equals `path`.
    pub fn at(&self, path: &str) -> Vec<&Violation> {
        self.violations
            .iter()
            .filter(|v| v.path.to_string() == path)
            .collect()
    }
}
