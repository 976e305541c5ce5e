//! Schema type nodes: the leaf description of one scalar value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::composite::Presence;
use crate::constraint::{Constraint, CustomConstraint, CustomContext, Pattern, Range};
use crate::error::{SchemaError, SchemaResult};
use crate::evaluator::ConstraintEvaluator;
use crate::path::FieldPath;
use crate::violation::{ValidationError, Violation};

/// Primitive value types a node accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    String,
    Integer,
    Float,
    Bool,
}

impl Primitive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "string" | "str" => Some(Primitive::String),
            "integer" | "int" => Some(Primitive::Integer),
            "float" | "number" => Some(Primitive::Float),
            "bool" | "boolean" => Some(Primitive::Bool),
            _ => None,
        }
    }

    /// Whether `value` has this primitive type. Integers are valid floats.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Primitive::String => value.is_string(),
            Primitive::Integer => value.is_i64() || value.is_u64(),
            Primitive::Float => value.is_number(),
            Primitive::Bool => value.is_boolean(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Primitive::Integer | Primitive::Float)
    }
}

impl std::fmt::Display for Primitive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Human name of a JSON value's type, used in mismatch messages.
pub fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

/// Shape of a node, derived from its constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// No constraints beyond the primitive type.
    Scalar,
    /// Only membership constraints.
    Enum,
    /// Any other combination.
    Constrained,
}

/// Description of one scalar, enum or constrained value.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeNode {
    primitive: Primitive,
    constraints: Vec<Constraint>,
    presence: Presence,
    description: Option<String>,
}

impl TypeNode {
    pub fn new(primitive: Primitive) -> Self {
        Self {
            primitive,
            constraints: Vec::new(),
            presence: Presence::default(),
            description: None,
        }
    }

    pub fn string() -> Self {
        Self::new(Primitive::String)
    }

    pub fn integer() -> Self {
        Self::new(Primitive::Integer)
    }

    pub fn float() -> Self {
        Self::new(Primitive::Float)
    }

    pub fn boolean() -> Self {
        Self::new(Primitive::Bool)
    }

    /// A string restricted to the given values.
    pub fn string_enum<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::string().included_in(values.into_iter().map(|s| Value::String(s.into())))
    }

    /// Require an anchored match of `pattern`.
    pub fn format(self, pattern: &str) -> SchemaResult<Self> {
        Ok(self.constrain(Constraint::Format(Pattern::new(pattern)?)))
    }

    pub fn pattern(self, pattern: Pattern) -> Self {
        self.constrain(Constraint::Format(pattern))
    }

    /// Inclusive numeric bounds.
    pub fn range(self, min: impl Into<f64>, max: impl Into<f64>) -> Self {
        self.constrain(Constraint::Range(Range::inclusive(min, max)))
    }

    pub fn bounded(self, range: Range) -> Self {
        self.constrain(Constraint::Range(range))
    }

    pub fn min(self, min: impl Into<f64>) -> Self {
        self.constrain(Constraint::Range(Range::at_least(min)))
    }

    pub fn max(self, max: impl Into<f64>) -> Self {
        self.constrain(Constraint::Range(Range::at_most(max)))
    }

    pub fn included_in<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constrain(Constraint::IncludedIn(values.into_iter().map(Into::into).collect()))
    }

    pub fn min_size(self, min: usize) -> Self {
        self.constrain(Constraint::Size {
            min: Some(min),
            max: None,
        })
    }

    pub fn max_size(self, max: usize) -> Self {
        self.constrain(Constraint::Size {
            min: None,
            max: Some(max),
        })
    }

    pub fn size(self, min: usize, max: usize) -> Self {
        self.constrain(Constraint::Size {
            min: Some(min),
            max: Some(max),
        })
    }

    pub fn custom(self, custom: CustomConstraint) -> Self {
        self.constrain(Constraint::Custom(custom))
    }

    /// Append a constraint. Constraints run in the order they were added.
    pub fn constrain(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
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

    pub fn kind(&self) -> NodeKind {
        if self.constraints.is_empty() {
            NodeKind::Scalar
        } else if self
            .constraints
            .iter()
            .all(|c| matches!(c, Constraint::IncludedIn(_)))
        {
            NodeKind::Enum
        } else {
            NodeKind::Constrained
        }
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub(crate) fn presence_mut(&mut self) -> &mut Presence {
        &mut self.presence
    }

    pub fn is_optional(&self) -> bool {
        self.presence.optional
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.presence.default.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Validate a standalone value against this node.
    ///
    /// `None` and `Some(Value::Null)` both mean "absent". Absent optional values
    /// without a default come back as `Ok(None)`.
    pub fn validate(&self, raw: Option<&Value>) -> Result<Option<Value>, ValidationError> {
        let path = FieldPath::root();
        let empty = Map::new();
        let ctx = CustomContext::new(&path, &empty);

        let raw = raw.filter(|v| !v.is_null());
        let result = match (raw, self.default_value()) {
            (Some(value), _) => ConstraintEvaluator::evaluate(self, value, &ctx).map(Some),
            (None, Some(default)) => ConstraintEvaluator::evaluate(self, default, &ctx).map(Some),
            (None, None) if self.is_optional() => Ok(None),
            (None, None) => Err(Violation::missing(path.clone())),
        };
        result.map_err(|v| ValidationError::new(vec![v]))
    }

    /// Check the node's own definition: constraint compatibility, range sanity and
    /// that any default satisfies the node.
    pub fn verify(&self, path: &FieldPath) -> SchemaResult<()> {
        for constraint in &self.constraints {
            let compatible = match constraint {
                Constraint::Format(_) | Constraint::Size { .. } => {
                    self.primitive == Primitive::String
                }
                Constraint::Range(_) => self.primitive.is_numeric(),
                Constraint::IncludedIn(values) => values.iter().all(|v| self.primitive.accepts(v)),
                Constraint::Custom(_) => true,
            };
            if !compatible {
                return Err(SchemaError::IncompatibleConstraint {
                    path: path.to_string(),
                    constraint: constraint.name().to_string(),
                    primitive: self.primitive.to_string(),
                });
            }

            if let Constraint::Range(range) = constraint {
                if let (Some(min), Some(max)) = (range.min, range.max) {
                    if min > max {
                        return Err(SchemaError::InvalidRange {
                            path: path.to_string(),
                            min,
                            max,
                        });
                    }
                }
            }
        }

        if let Some(default) = self.default_value() {
            let empty = Map::new();
            let ctx = CustomContext::new(path, &empty);
            ConstraintEvaluator::evaluate(self, default, &ctx).map_err(|v| {
                SchemaError::InvalidDefault {
                    path: path.to_string(),
                    message: v.message,
                }
            })?;
        }

        Ok(())
    }
}
