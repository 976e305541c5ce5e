//! Constraint evaluation for a single value.

use serde_json::Value;

use crate::constraint::{format_number, Constraint, CustomContext};
use crate::node::{describe_value, TypeNode};
use crate::violation::Violation;

/// Runs a node's type check and constraints against one present value.
///
/// Constraints run in declaration order and the first failure stops evaluation of
/// that value. Each stage receives the output of the previous one, so a custom stage
/// that normalizes a value hands the normalized form to every later constraint.
pub struct ConstraintEvaluator;

impl ConstraintEvaluator {
    pub fn evaluate(node: &TypeNode, value: &Value, ctx: &CustomContext<'_>) -> Result<Value, Violation> {
        let primitive = node.primitive();
        if !primitive.accepts(value) {
            return Err(Violation::type_mismatch(
                ctx.path().clone(),
                primitive.as_str(),
                describe_value(value),
            ));
        }

        let mut current = value.clone();
        for constraint in node.constraints() {
            current = Self::apply(constraint, current, ctx)?;
            if !primitive.accepts(&current) {
                return Err(Violation::custom(
                    ctx.path().clone(),
                    format!(
                        "'{}' produced a {} where a {} was expected",
                        constraint.name(),
                        describe_value(&current),
                        primitive
                    ),
                ));
            }
        }
        Ok(current)
    }

    /// Apply one constraint, returning the value to carry forward.
    pub fn apply(constraint: &Constraint, value: Value, ctx: &CustomContext<'_>) -> Result<Value, Violation> {
        let path = ctx.path();
        match constraint {
            Constraint::Format(pattern) => match value.as_str() {
                Some(text) if pattern.is_match(text) => Ok(value),
                Some(text) => Err(Violation::constraint(
                    path.clone(),
                    format!("must match format /{}/, got {:?}", pattern.as_str(), text),
                )),
                None => Err(Violation::type_mismatch(path.clone(), "string", describe_value(&value))),
            },
            Constraint::Range(range) => match range.contains_value(&value) {
                Some(true) => Ok(value),
                Some(false) => Err(Violation::constraint(
                    path.clone(),
                    format!("must be within {}, got {}", range.describe(), render_number(&value)),
                )),
                None => Err(Violation::type_mismatch(path.clone(), "number", describe_value(&value))),
            },
            Constraint::IncludedIn(allowed) => {
                if allowed.contains(&value) {
                    Ok(value)
                } else {
                    Err(Violation::constraint(
                        path.clone(),
                        format!("must be one of {}, got {}", render_set(allowed), value),
                    ))
                }
            }
            Constraint::Size { min, max } => {
                let Some(text) = value.as_str() else {
                    return Err(Violation::type_mismatch(path.clone(), "string", describe_value(&value)));
                };
                let len = text.chars().count();
                if let Some(min) = min {
                    if len < *min {
                        return Err(Violation::constraint(
                            path.clone(),
                            format!("length must be at least {}, got {}", min, len),
                        ));
                    }
                }
                if let Some(max) = max {
                    if len > *max {
                        return Err(Violation::constraint(
                            path.clone(),
                            format!("length must be at most {}, got {}", max, len),
                        ));
                    }
                }
                Ok(value)
            }
            Constraint::Custom(custom) => custom
                .apply(&value, ctx)
                .map_err(|message| Violation::custom(path.clone(), format!("{}: {}", custom.name(), message))),
        }
    }
}

fn render_number(value: &Value) -> String {
    if value.is_i64() || value.is_u64() {
        value.to_string()
    } else {
        value.as_f64().map(format_number).unwrap_or_else(|| value.to_string())
    }
}

fn render_set(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}
