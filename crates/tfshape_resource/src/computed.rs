//! Computed properties: read-only values derived from a validated record.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use tfshape_schema::Record;

use crate::context::ResolveContext;
use crate::rules::Condition;

/// Value of a computed property.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Flag(bool),
    Category(String),
    Score(f64),
    Identifier(String),
    /// The property cannot be derived for this record (e.g. no account id known).
    Unset,
}

impl PropertyValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Category(s) | PropertyValue::Identifier(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Score(score) => Some(*score),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, PropertyValue::Unset)
    }

    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Flag(flag) => Value::Bool(*flag),
            PropertyValue::Category(s) | PropertyValue::Identifier(s) => Value::String(s.clone()),
            PropertyValue::Score(score) => serde_json::Number::from_f64(*score)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            PropertyValue::Unset => Value::Null,
        }
    }
}

/// Derivation function of a property.
pub type Resolver = dyn Fn(&Record, &ResolveContext) -> PropertyValue + Send + Sync;

/// A named, pure derivation over a record.
#[derive(Clone)]
pub struct ComputedProperty {
    name: String,
    resolve: Arc<Resolver>,
}

impl ComputedProperty {
    pub fn new<F>(name: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&Record, &ResolveContext) -> PropertyValue + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            resolve: Arc::new(resolve),
        }
    }

    pub fn flag<F>(name: impl Into<String>, flag: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Self::new(name, move |record, _| PropertyValue::Flag(flag(record)))
    }

    pub fn score<F>(name: impl Into<String>, score: F) -> Self
    where
        F: Fn(&Record) -> f64 + Send + Sync + 'static,
    {
        Self::new(name, move |record, _| PropertyValue::Score(score(record)))
    }

    /// An identifier; `None` resolves to [`PropertyValue::Unset`].
    pub fn identifier<F>(name: impl Into<String>, identifier: F) -> Self
    where
        F: Fn(&Record, &ResolveContext) -> Option<String> + Send + Sync + 'static,
    {
        Self::new(name, move |record, context| {
            identifier(record, context)
                .map(PropertyValue::Identifier)
                .unwrap_or(PropertyValue::Unset)
        })
    }

    pub fn category(name: impl Into<String>, classifier: Classifier) -> Self {
        Self::new(name, move |record, _| PropertyValue::Category(classifier.classify(record).to_string()))
    }

    pub fn arn(name: impl Into<String>, template: ArnTemplate) -> Self {
        Self::identifier(name, move |record, context| template.render(record, context))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolve(&self, record: &Record, context: &ResolveContext) -> PropertyValue {
        (self.resolve)(record, context)
    }
}

impl fmt::Debug for ComputedProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComputedProperty").field(&self.name).finish()
    }
}

/// Category resolution with an explicit precedence order.
///
/// Rules are tried in the order they were added and the first whose condition
/// holds decides the category. When none holds the fallback applies.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<(String, Condition)>,
    fallback: String,
}

impl Classifier {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            fallback: fallback.into(),
        }
    }

    /// Add a category below every category added before it.
    pub fn rule(mut self, category: impl Into<String>, condition: Condition) -> Self {
        self.rules.push((category.into(), condition));
        self
    }

    /// Categories from highest to lowest precedence, fallback last.
    pub fn precedence(&self) -> Vec<&str> {
        self.rules
            .iter()
            .map(|(category, _)| category.as_str())
            .chain(std::iter::once(self.fallback.as_str()))
            .collect()
    }

    pub fn classify(&self, record: &Record) -> &str {
        self.rules
            .iter()
            .find(|(_, condition)| condition.holds(record))
            .map(|(category, _)| category.as_str())
            .unwrap_or(self.fallback.as_str())
    }
}

/// ARN assembly: `arn:{partition}:{service}:{region}:{account}:{resource}`.
///
/// `resource` may contain `{field}` placeholders filled from the record (dotted
/// paths allowed). Global services leave the region out; services whose ARNs carry
/// no account leave the account out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArnTemplate {
    service: String,
    resource: String,
    regional: bool,
    with_account: bool,
}

impl ArnTemplate {
    pub fn new(service: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            resource: resource.into(),
            regional: true,
            with_account: true,
        }
    }

    pub fn global(mut self) -> Self {
        self.regional = false;
        self
    }

    pub fn without_account(mut self) -> Self {
        self.with_account = false;
        self
    }

    /// `None` when a placeholder field is absent or the account is needed but unknown.
    pub fn render(&self, record: &Record, context: &ResolveContext) -> Option<String> {
        let region = if self.regional { context.region.as_str() } else { "" };
        let account = if self.with_account {
            context.account_id.as_deref()?
        } else {
            ""
        };
        let resource = fill_placeholders(&self.resource, record)?;
        Some(format!(
            "arn:{}:{}:{}:{}:{}",
            context.partition, self.service, region, account, resource
        ))
    }
}

fn fill_placeholders(template: &str, record: &Record) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let end = rest[start..].find('}')? + start;
        let field = &rest[start + 1..end];
        match record.lookup(field)? {
            Value::String(s) => out.push_str(s),
            other => out.push_str(&other.to_string()),
        }
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

/// Ordered properties of one resource.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    properties: Vec<ComputedProperty>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, property: ComputedProperty) {
        self.properties.push(property);
    }

    pub fn with(mut self, property: ComputedProperty) -> Self {
        self.add(property);
        self
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name() == name)
    }

    pub fn get(&self, index: usize) -> Option<&ComputedProperty> {
        self.properties.get(index)
    }

    pub fn names(&self) -> Vec<&str> {
        self.properties.iter().map(ComputedProperty::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComputedProperty> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tfshape_schema::{RecordBuilder, RecordSchema, TypeNode};

    fn role(name: &str) -> Record {
        let schema = RecordSchema::new()
            .field("name", TypeNode::string())
            .field("path", TypeNode::string().with_default("/"));
        RecordBuilder::new(&schema).build(&json!({ "name": name })).unwrap()
    }

    fn classifier() -> Classifier {
        Classifier::new("service")
            .rule("operations", Condition::matches("name", "(?i)ops|operations").unwrap())
            .rule("developer", Condition::matches("name", "(?i)dev").unwrap())
    }

    #[test]
    fn test_classifier_precedence() {
        let classifier = classifier();
        assert_eq!(classifier.classify(&role("devops-deployer")), "operations");
        assert_eq!(classifier.classify(&role("developer")), "developer");
        assert_eq!(classifier.classify(&role("lambda-exec")), "service");
        assert_eq!(classifier.precedence(), vec!["operations", "developer", "service"]);
    }

    #[test]
    fn test_arn_rendering() {
        let record = role("deployer");
        let context = ResolveContext::new("eu-west-1").with_account("123456789012");

        let iam = ArnTemplate::new("iam", "role{path}{name}").global();
        assert_eq!(
            iam.render(&record, &context).as_deref(),
            Some("arn:aws:iam::123456789012:role/deployer")
        );

        let regional = ArnTemplate::new("lambda", "function:{name}");
        assert_eq!(
            regional.render(&record, &context).as_deref(),
            Some("arn:aws:lambda:eu-west-1:123456789012:function:deployer")
        );

        assert!(regional.render(&record, &ResolveContext::default()).is_none());
        assert!(ArnTemplate::new("s3", "{bucket}").without_account().render(&record, &context).is_none());
    }

    #[test]
    fn test_property_values() {
        let context = ResolveContext::default();
        let record = role("x");
        let flag = ComputedProperty::flag("has_path", |r| r.contains("path"));
        assert_eq!(flag.resolve(&record, &context), PropertyValue::Flag(true));

        let score = ComputedProperty::score("length", |r| r.get_str("name").map_or(0.0, |s| s.len() as f64));
        assert_eq!(score.resolve(&record, &context).as_f64(), Some(1.0));
        assert_eq!(PropertyValue::Unset.to_json(), Value::Null);
        assert_eq!(serde_json::to_value(PropertyValue::Category("a".into())).unwrap(), json!("a"));
    }
}
