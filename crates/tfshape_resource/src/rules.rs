//! Cross-field rules and rule sets.
//!
//! Rules run against a fully built [`Record`], in the order they were added. Every
//! failing rule contributes one [`Violation`] of kind `CrossFieldViolation`; nothing
//! short-circuits.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use tfshape_schema::{FieldPath, Record, Violation};

use crate::error::{ResourceError, ResourceResult};

/// Arbitrary record-level predicate.
pub type RecordPredicate = dyn Fn(&Record) -> bool + Send + Sync;

/// Arbitrary record-level check returning a failure message.
pub type RecordCheck = dyn Fn(&Record) -> Result<(), String> + Send + Sync;

/// When a rule applies. Field names may be dotted (`alias.zone_id`).
#[derive(Clone)]
pub enum Condition {
    Always,
    Present(String),
    Absent(String),
    Equals(String, Value),
    OneOf(String, Vec<Value>),
    AnyPresent(Vec<String>),
    /// The field is a string matching the (unanchored) pattern.
    Matches(String, Regex),
    All(Vec<Condition>),
    Predicate(Arc<RecordPredicate>),
}

impl Condition {
    pub fn present(field: impl Into<String>) -> Self {
        Condition::Present(field.into())
    }

    pub fn absent(field: impl Into<String>) -> Self {
        Condition::Absent(field.into())
    }

    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Equals(field.into(), value.into())
    }

    pub fn one_of<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Condition::OneOf(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn any_present<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Condition::AnyPresent(fields.into_iter().map(Into::into).collect())
    }

    pub fn matches(field: impl Into<String>, pattern: &str) -> ResourceResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| ResourceError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(Condition::Matches(field.into(), regex))
    }

    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate(Arc::new(predicate))
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::All(mut conditions) => {
                conditions.push(other);
                Condition::All(conditions)
            }
            Condition::Always => other,
            this => Condition::All(vec![this, other]),
        }
    }

    pub fn holds(&self, record: &Record) -> bool {
        match self {
            Condition::Always => true,
            Condition::Present(field) => is_set(record, field),
            Condition::Absent(field) => !is_set(record, field),
            Condition::Equals(field, expected) => record.lookup(field) == Some(expected),
            Condition::OneOf(field, values) => record.lookup(field).is_some_and(|v| values.contains(v)),
            Condition::AnyPresent(fields) => fields.iter().any(|f| is_set(record, f)),
            Condition::Matches(field, regex) => record
                .lookup(field)
                .and_then(Value::as_str)
                .is_some_and(|s| regex.is_match(s)),
            Condition::All(conditions) => conditions.iter().all(|c| c.holds(record)),
            Condition::Predicate(predicate) => predicate(record),
        }
    }

    /// Human-readable form used in generated messages.
    pub fn describe(&self) -> String {
        match self {
            Condition::Always => "always".to_string(),
            Condition::Present(field) => format!("{} is set", field),
            Condition::Absent(field) => format!("{} is not set", field),
            Condition::Equals(field, value) => format!("{} is {}", field, value),
            Condition::OneOf(field, values) => format!("{} is one of {}", field, Value::Array(values.clone())),
            Condition::AnyPresent(fields) => format!("any of {} is set", fields.join(", ")),
            Condition::Matches(field, regex) => format!("{} matches /{}/", field, regex.as_str()),
            Condition::All(conditions) => conditions
                .iter()
                .map(Condition::describe)
                .collect::<Vec<_>>()
                .join(" and "),
            Condition::Predicate(_) => "the rule condition holds".to_string(),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Condition({})", self.describe())
    }
}

fn is_set(record: &Record, field: &str) -> bool {
    record.lookup(field).is_some()
}

fn join_and(fields: &[&str]) -> String {
    match fields {
        [] => String::new(),
        [one] => one.to_string(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// What must hold once a rule applies.
#[derive(Clone)]
pub enum Requirement {
    AtMostOneOf(Vec<String>),
    AtLeastOneOf(Vec<String>),
    ExactlyOneOf(Vec<String>),
    AllPresent(Vec<String>),
    AllAbsent(Vec<String>),
    Check(Arc<RecordCheck>),
}

impl Requirement {
    /// Location and generated message of a failure.
    fn check(&self, record: &Record) -> Option<(FieldPath, String)> {
        match self {
            Requirement::AtMostOneOf(fields) => {
                let set = present_fields(record, fields);
                (set.len() > 1).then(|| {
                    (
                        FieldPath::parse(set[0]),
                        format!("{} are mutually exclusive", join_and(&set)),
                    )
                })
            }
            Requirement::AtLeastOneOf(fields) => present_fields(record, fields).is_empty().then(|| {
                (
                    first_path(fields),
                    format!("at least one of {} must be set", fields.join(", ")),
                )
            }),
            Requirement::ExactlyOneOf(fields) => {
                let set = present_fields(record, fields);
                match set.len() {
                    1 => None,
                    0 => Some((
                        first_path(fields),
                        format!("exactly one of {} must be set, got none", fields.join(", ")),
                    )),
                    _ => Some((
                        FieldPath::parse(set[0]),
                        format!("exactly one of {} must be set, got {}", fields.join(", "), join_and(&set)),
                    )),
                }
            }
            Requirement::AllPresent(fields) => {
                let missing: Vec<&str> = fields
                    .iter()
                    .filter(|f| !is_set(record, f))
                    .map(String::as_str)
                    .collect();
                (!missing.is_empty()).then(|| (FieldPath::parse(missing[0]), format!("{} must be set", join_and(&missing))))
            }
            Requirement::AllAbsent(fields) => {
                let set = present_fields(record, fields);
                (!set.is_empty()).then(|| (FieldPath::parse(set[0]), format!("{} must not be set", join_and(&set))))
            }
            Requirement::Check(check) => check(record).err().map(|message| (FieldPath::root(), message)),
        }
    }
}

fn present_fields<'f>(record: &Record, fields: &'f [String]) -> Vec<&'f str> {
    fields
        .iter()
        .filter(|f| is_set(record, f))
        .map(String::as_str)
        .collect()
}

fn first_path(fields: &[String]) -> FieldPath {
    fields.first().map(|f| FieldPath::parse(f)).unwrap_or_default()
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::AtMostOneOf(fields) => write!(f, "AtMostOneOf({:?})", fields),
            Requirement::AtLeastOneOf(fields) => write!(f, "AtLeastOneOf({:?})", fields),
            Requirement::ExactlyOneOf(fields) => write!(f, "ExactlyOneOf({:?})", fields),
            Requirement::AllPresent(fields) => write!(f, "AllPresent({:?})", fields),
            Requirement::AllAbsent(fields) => write!(f, "AllAbsent({:?})", fields),
            Requirement::Check(_) => write!(f, "Check(..)"),
        }
    }
}

/// An invariant spanning several fields of one record.
#[derive(Debug, Clone)]
pub struct CrossFieldRule {
    pub name: String,
    pub applies_when: Condition,
    pub require: Requirement,
    pub message: Option<String>,
}

fn names<I, S>(fields: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fields.into_iter().map(Into::into).collect()
}

impl CrossFieldRule {
    pub fn new(name: impl Into<String>, applies_when: Condition, require: Requirement) -> Self {
        Self {
            name: name.into(),
            applies_when,
            require,
            message: None,
        }
    }

    /// At most one of `fields` may be set.
    pub fn mutually_exclusive<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = names(fields);
        Self::new(
            format!("mutually_exclusive({})", fields.join(", ")),
            Condition::Always,
            Requirement::AtMostOneOf(fields),
        )
    }

    pub fn at_least_one_of<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = names(fields);
        Self::new(
            format!("at_least_one_of({})", fields.join(", ")),
            Condition::Always,
            Requirement::AtLeastOneOf(fields),
        )
    }

    pub fn exactly_one_of<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = names(fields);
        Self::new(
            format!("exactly_one_of({})", fields.join(", ")),
            Condition::Always,
            Requirement::ExactlyOneOf(fields),
        )
    }

    /// When `field` is set, every one of `dependencies` must be set too.
    pub fn requires<I, S>(field: impl Into<String>, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let field = field.into();
        let dependencies = names(dependencies);
        Self::new(
            format!("{}_requires({})", field, dependencies.join(", ")),
            Condition::Present(field),
            Requirement::AllPresent(dependencies),
        )
    }

    /// When `field` is set, none of `others` may be set.
    pub fn conflicts<I, S>(field: impl Into<String>, others: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let field = field.into();
        let others = names(others);
        Self::new(
            format!("{}_conflicts({})", field, others.join(", ")),
            Condition::Present(field),
            Requirement::AllAbsent(others),
        )
    }

    /// A requirement that applies only while `condition` holds.
    pub fn when(name: impl Into<String>, condition: Condition, require: Requirement) -> Self {
        Self::new(name, condition, require)
    }

    /// A free-form record check. Failures are reported at the record root.
    pub fn check<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Record) -> Result<(), String> + Send + Sync + 'static,
    {
        Self::new(name, Condition::Always, Requirement::Check(Arc::new(check)))
    }

    /// Replace the generated message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn evaluate(&self, record: &Record) -> Option<Violation> {
        if !self.applies_when.holds(record) {
            return None;
        }
        let (path, generated) = self.require.check(record)?;
        let message = match (&self.message, &self.require, &self.applies_when) {
            (Some(message), _, _) => message.clone(),
            (None, Requirement::Check(_), _) | (None, _, Condition::Always) => generated,
            (None, _, condition) => format!("{} when {}", generated, condition.describe()),
        };
        Some(Violation::cross_field(path, message))
    }
}

/// Ordered cross-field rules of one resource.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<CrossFieldRule>,
}

impl RuleSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Add a rule to the set.
    pub fn add(&mut self, rule: CrossFieldRule) {
        self.rules.push(rule);
    }

    pub fn with(mut self, rule: CrossFieldRule) -> Self {
        self.add(rule);
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule, in order, collecting all violations.
    pub fn evaluate(&self, record: &Record) -> Vec<Violation> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            if let Some(violation) = rule.evaluate(record) {
                debug!("Rule '{}' of '{}' failed: {}", rule.name, self.name, violation.message);
                violations.push(violation);
            }
        }
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tfshape_schema::{ErrorKind, RecordBuilder, RecordSchema, TypeNode};

    fn record(input: Value) -> Record {
        let schema = RecordSchema::new()
            .field("alias", RecordSchema::new().field("zone_id", TypeNode::string()).optional())
            .field("ttl", TypeNode::integer().optional())
            .field("records", tfshape_schema::ListSchema::of(TypeNode::string()).optional())
            .field("type", TypeNode::string().with_default("A"));
        RecordBuilder::new(&schema).build(&input).unwrap()
    }

    #[test]
    fn test_conflicts_names_every_field() {
        let rule = CrossFieldRule::conflicts("alias", ["ttl", "records"]);
        let violation = rule
            .evaluate(&record(json!({ "alias": { "zone_id": "Z1" }, "ttl": 300, "records": ["a"] })))
            .unwrap();
        assert_eq!(violation.kind, ErrorKind::CrossFieldViolation);
        assert_eq!(violation.path.to_string(), "ttl");
        assert_eq!(violation.message, "ttl and records must not be set when alias is set");

        assert!(rule.evaluate(&record(json!({ "ttl": 300 }))).is_none());
    }

    #[test]
    fn test_mutual_exclusion_and_exactly_one() {
        let exclusive = CrossFieldRule::mutually_exclusive(["alias", "ttl"]);
        let exactly = CrossFieldRule::exactly_one_of(["alias", "ttl"]);

        let both = record(json!({ "alias": { "zone_id": "Z1" }, "ttl": 60 }));
        assert_eq!(exclusive.evaluate(&both).unwrap().message, "alias and ttl are mutually exclusive");
        assert!(exactly.evaluate(&both).is_some());

        let neither = record(json!({}));
        assert!(exclusive.evaluate(&neither).is_none());
        assert_eq!(
            exactly.evaluate(&neither).unwrap().message,
            "exactly one of alias, ttl must be set, got none"
        );

        let one = record(json!({ "ttl": 60 }));
        assert!(exclusive.evaluate(&one).is_none());
        assert!(exactly.evaluate(&one).is_none());
    }

    #[test]
    fn test_conditional_on_value() {
        let rule = CrossFieldRule::when(
            "cname_single_record",
            Condition::equals("type", "CNAME"),
            Requirement::Check(Arc::new(|record: &Record| match record.get_list("records") {
                Some(items) if items.len() != 1 => Err("CNAME records take exactly one value".to_string()),
                _ => Ok(()),
            })),
        );
        assert!(rule.evaluate(&record(json!({ "type": "CNAME", "records": ["a", "b"] }))).is_some());
        assert!(rule.evaluate(&record(json!({ "records": ["a", "b"] }))).is_none());
    }

    #[test]
    fn test_rule_set_collects_all() {
        let rules = RuleSet::new("test")
            .with(CrossFieldRule::requires("alias", ["ttl"]).with_message("alias needs ttl"))
            .with(CrossFieldRule::at_least_one_of(["records", "ttl"]));
        let violations = rules.evaluate(&record(json!({ "alias": { "zone_id": "Z1" } })));
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].message, "alias needs ttl");
        assert_eq!(violations[1].path.to_string(), "records");
    }

    #[test]
    fn test_condition_combinators() {
        let condition = Condition::present("alias")
            .and(Condition::matches("alias.zone_id", "^Z").unwrap())
            .and(Condition::one_of("type", ["A", "AAAA"]));
        assert!(condition.holds(&record(json!({ "alias": { "zone_id": "Z1" } }))));
        assert!(!condition.holds(&record(json!({ "alias": { "zone_id": "X1" } }))));
        assert_eq!(
            Condition::any_present(["ttl", "records"]).describe(),
            "any of ttl, records is set"
        );
        assert!(Condition::matches("x", "(").is_err());
    }
}
