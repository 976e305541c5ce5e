//! Constraint definitions attached to type nodes.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{SchemaError, SchemaResult};
use crate::path::FieldPath;

/// A regular expression that must match the whole value.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    /// Compile `source` anchored at both ends.
    pub fn new(source: &str) -> SchemaResult<Self> {
        let anchored = format!("^(?:{})$", source);
        let regex = Regex::new(&anchored).map_err(|e| SchemaError::InvalidPattern {
            pattern: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

/// Numeric bounds. Inclusive unless marked exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub exclusive_min: bool,
    pub exclusive_max: bool,
}

impl Range {
    pub fn inclusive(min: impl Into<f64>, max: impl Into<f64>) -> Self {
        Self {
            min: Some(min.into()),
            max: Some(max.into()),
            exclusive_min: false,
            exclusive_max: false,
        }
    }

    pub fn at_least(min: impl Into<f64>) -> Self {
        Self {
            min: Some(min.into()),
            max: None,
            exclusive_min: false,
            exclusive_max: false,
        }
    }

    pub fn at_most(max: impl Into<f64>) -> Self {
        Self {
            min: None,
            max: Some(max.into()),
            exclusive_min: false,
            exclusive_max: false,
        }
    }

    pub fn exclusive(mut self) -> Self {
        self.exclusive_min = self.min.is_some();
        self.exclusive_max = self.max.is_some();
        self
    }

    pub fn contains(&self, x: f64) -> bool {
        let above = match self.min {
            Some(min) if self.exclusive_min => x > min,
            Some(min) => x >= min,
            None => true,
        };
        let below = match self.max {
            Some(max) if self.exclusive_max => x < max,
            Some(max) => x <= max,
            None => true,
        };
        above && below
    }

    /// Check a JSON number. Integers are compared exactly, without a detour
    /// through `f64`. `None` when `value` is not a number.
    pub fn contains_value(&self, value: &Value) -> Option<bool> {
        let exact = value
            .as_i64()
            .map(i128::from)
            .or_else(|| value.as_u64().map(i128::from));
        match exact {
            Some(x) => Some(self.contains_integer(x)),
            None => value.as_f64().map(|x| self.contains(x)),
        }
    }

    fn contains_integer(&self, x: i128) -> bool {
        let above = match self.min {
            Some(min) if self.exclusive_min => compare_integer(x, min) == Ordering::Greater,
            Some(min) => compare_integer(x, min) != Ordering::Less,
            None => true,
        };
        let below = match self.max {
            Some(max) if self.exclusive_max => compare_integer(x, max) == Ordering::Less,
            Some(max) => compare_integer(x, max) != Ordering::Greater,
            None => true,
        };
        above && below
    }

    /// Interval notation, e.g. `[0, 255]` or `(0, +inf)`.
    pub fn describe(&self) -> String {
        let open = if self.exclusive_min || self.min.is_none() { '(' } else { '[' };
        let close = if self.exclusive_max || self.max.is_none() { ')' } else { ']' };
        let min = self.min.map(format_number).unwrap_or_else(|| "-inf".to_string());
        let max = self.max.map(format_number).unwrap_or_else(|| "+inf".to_string());
        format!("{}{}, {}{}", open, min, max, close)
    }
}

/// Order an integer against a float bound without rounding the integer.
fn compare_integer(x: i128, bound: f64) -> Ordering {
    if bound.is_nan() {
        return Ordering::Equal;
    }
    let floor = bound.floor();
    if floor >= i128::MAX as f64 {
        return Ordering::Less;
    }
    if floor < i128::MIN as f64 {
        return Ordering::Greater;
    }
    match x.cmp(&(floor as i128)) {
        Ordering::Equal if bound > floor => Ordering::Less,
        ordering => ordering,
    }
}

pub(crate) fn format_number(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    }
}

/// What a custom stage sees besides the value itself.
pub struct CustomContext<'a> {
    path: &'a FieldPath,
    record: &'a Map<String, Value>,
}

impl<'a> CustomContext<'a> {
    pub fn new(path: &'a FieldPath, record: &'a Map<String, Value>) -> Self {
        Self { path, record }
    }

    /// Location of the value being checked.
    pub fn path(&self) -> &FieldPath {
        self.path
    }

    /// Sibling fields of the enclosing record that were declared, and built,
    /// before the current one.
    pub fn sibling(&self, name: &str) -> Option<&Value> {
        self.record.get(name).filter(|v| !v.is_null())
    }

    pub fn record(&self) -> &Map<String, Value> {
        self.record
    }
}

pub type CustomFn = dyn Fn(&Value, &CustomContext<'_>) -> Result<Value, String> + Send + Sync;

/// A named business-rule stage.
///
/// The stage returns the value to carry forward (possibly normalized) or a failure
/// message. Normalizations must be idempotent. Two stages are equal when their names
/// are, which is what lets registries compare schemas that carry closures.
#[derive(Clone)]
pub struct CustomConstraint {
    name: String,
    check: Arc<CustomFn>,
}

impl CustomConstraint {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, &CustomContext<'_>) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Approve or reject without transforming.
    pub fn predicate<F>(name: impl Into<String>, message: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let message = message.into();
        Self::new(name, move |value, _| {
            if predicate(value) {
                Ok(value.clone())
            } else {
                Err(message.clone())
            }
        })
    }

    /// Transform the value, ignoring the surrounding record.
    pub fn transform<F>(name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self::new(name, move |value, _| transform(value))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, value: &Value, ctx: &CustomContext<'_>) -> Result<Value, String> {
        (self.check)(value, ctx)
    }
}

impl PartialEq for CustomConstraint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for CustomConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CustomConstraint").field(&self.name).finish()
    }
}

/// A single rule a value must satisfy.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Format(Pattern),
    Range(Range),
    IncludedIn(Vec<Value>),
    Size { min: Option<usize>, max: Option<usize> },
    Custom(CustomConstraint),
}

impl Constraint {
    pub fn name(&self) -> &str {
        match self {
            Constraint::Format(_) => "format",
            Constraint::Range(_) => "range",
            Constraint::IncludedIn(_) => "included_in",
            Constraint::Size { .. } => "size",
            Constraint::Custom(custom) => custom.name(),
        }
    }
}
