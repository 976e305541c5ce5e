//! Resource definitions and validated resources.

use std::sync::{Arc, OnceLock};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use tfshape_schema::{flatten, FieldPath, Record, RecordBuilder, RecordSchema, ValidationError};

use crate::computed::{ComputedProperty, PropertySet, PropertyValue};
use crate::context::ResolveContext;
use crate::error::{ResourceError, ResourceResult};
use crate::rules::{CrossFieldRule, RuleSet};

/// Everything needed to validate one resource type.
///
/// Definitions are built once and shared read-only between validation calls.
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    resource_type: String,
    schema: Arc<RecordSchema>,
    rules: RuleSet,
    properties: PropertySet,
}

impl ResourceDefinition {
    /// Create a definition; the schema is verified first.
    pub fn new(resource_type: impl Into<String>, schema: RecordSchema) -> ResourceResult<Self> {
        let resource_type = resource_type.into();
        schema.verify(&FieldPath::root())?;
        debug!("Defined resource type: {}", resource_type);
        Ok(Self {
            rules: RuleSet::new(resource_type.clone()),
            resource_type,
            schema: Arc::new(schema),
            properties: PropertySet::new(),
        })
    }

    pub fn with_rule(mut self, rule: CrossFieldRule) -> Self {
        self.rules.add(rule);
        self
    }

    /// Add a computed property.
    ///
    /// Property names share the attribute map with the declared fields, so a name
    /// already used by a field or by another property is rejected.
    pub fn with_property(mut self, property: ComputedProperty) -> ResourceResult<Self> {
        let name = property.name();
        let reason = if self.schema.has_field(name) {
            Some("a declared field has the same name")
        } else if self.properties.position(name).is_some() {
            Some("a property with the same name is already defined")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(ResourceError::PropertyConflict {
                resource_type: self.resource_type,
                name: name.to_string(),
                reason: reason.to_string(),
            });
        }
        self.properties.add(property);
        Ok(self)
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    /// Validate with the default resolve context.
    pub fn validate(&self, raw: &Value) -> Result<ValidatedResource<'_>, ValidationError> {
        self.validate_with(raw, &ResolveContext::default())
    }

    /// Build the record, then run the cross-field rules.
    ///
    /// Rules only run when every field is valid. A record that fails any rule is
    /// discarded and all rule violations are returned together.
    pub fn validate_with(&self, raw: &Value, context: &ResolveContext) -> Result<ValidatedResource<'_>, ValidationError> {
        let record = RecordBuilder::new(&self.schema).build(raw).inspect_err(|err| {
            info!(
                "{} rejected with {} field violation(s)",
                self.resource_type,
                err.violations().len()
            );
        })?;

        let violations = self.rules.evaluate(&record);
        if !violations.is_empty() {
            info!(
                "{} rejected with {} cross-field violation(s)",
                self.resource_type,
                violations.len()
            );
            return Err(ValidationError::new(violations));
        }

        debug!("{} validated", self.resource_type);
        Ok(ValidatedResource::new(self, record, context.clone()))
    }

    /// Parse a YAML attribute map and validate it.
    pub fn validate_yaml(&self, text: &str, context: &ResolveContext) -> ResourceResult<ValidatedResource<'_>> {
        let raw: Value = serde_yaml::from_str(text)?;
        Ok(self.validate_with(&raw, context)?)
    }
}

/// A record that passed field and cross-field validation, with its computed
/// properties resolved lazily and at most once.
#[derive(Debug)]
pub struct ValidatedResource<'d> {
    definition: &'d ResourceDefinition,
    record: Record,
    context: ResolveContext,
    computed: Vec<OnceLock<PropertyValue>>,
}

impl<'d> ValidatedResource<'d> {
    fn new(definition: &'d ResourceDefinition, record: Record, context: ResolveContext) -> Self {
        let computed = (0..definition.properties.len()).map(|_| OnceLock::new()).collect();
        Self {
            definition,
            record,
            context,
            computed,
        }
    }

    pub fn resource_type(&self) -> &str {
        &self.definition.resource_type
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn context(&self) -> &ResolveContext {
        &self.context
    }

    /// Value of a declared field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.record.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.record.get_str(name)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.record.get_i64(name)
    }

    /// A computed property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        let index = self.definition.properties.position(name)?;
        self.resolve(index)
    }

    fn resolve(&self, index: usize) -> Option<&PropertyValue> {
        let property = self.definition.properties.get(index)?;
        let slot = self.computed.get(index)?;
        Some(slot.get_or_init(|| property.resolve(&self.record, &self.context)))
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        self.property(name).and_then(PropertyValue::as_bool)
    }

    pub fn category(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(PropertyValue::as_str)
    }

    pub fn score(&self, name: &str) -> Option<f64> {
        self.property(name).and_then(PropertyValue::as_f64)
    }

    pub fn identifier(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(PropertyValue::as_str)
    }

    /// Every computed property, in definition order.
    pub fn properties(&self) -> Vec<(&str, &PropertyValue)> {
        self.definition
            .properties
            .iter()
            .enumerate()
            .filter_map(|(index, property)| self.resolve(index).map(|value| (property.name(), value)))
            .collect()
    }

    /// Attribute map for synthesis: record attributes followed by the computed
    /// properties that could be derived. A pass-through key never gets replaced
    /// by a property of the same name.
    pub fn to_attribute_map(&self) -> Map<String, Value> {
        let mut attributes = self.record.to_attribute_map();
        for (name, value) in self.properties() {
            if value.is_unset() {
                continue;
            }
            if attributes.contains_key(name) {
                warn!("{}: pass-through key '{}' shadows a computed property", self.resource_type(), name);
                continue;
            }
            attributes.insert(name.to_string(), value.to_json());
        }
        attributes
    }

    /// Leaf attribute addresses, e.g. `alias.zone_id` or `records[0]`.
    pub fn flatten(&self) -> Vec<(String, Value)> {
        flatten(&self.definition.schema, &self.record)
    }

    pub fn into_record(self) -> Record {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tfshape_schema::{ErrorKind, TypeNode};

    fn definition() -> ResourceDefinition {
        let schema = RecordSchema::new()
            .field("instance", TypeNode::string().optional())
            .field("network_interface", TypeNode::string().optional())
            .field("domain", TypeNode::string_enum(["vpc", "standard"]).with_default("vpc"));
        ResourceDefinition::new("test_eip", schema)
            .unwrap()
            .with_rule(CrossFieldRule::exactly_one_of(["instance", "network_interface"]))
            .with_property(ComputedProperty::flag("attached_to_instance", |r| r.contains("instance")))
            .unwrap()
    }

    #[test]
    fn test_rules_run_after_fields() {
        let definition = definition();
        let err = definition
            .validate(&json!({ "domain": "classic", "instance": "i-1", "network_interface": "eni-1" }))
            .unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].kind, ErrorKind::ConstraintViolation);

        let err = definition
            .validate(&json!({ "instance": "i-1", "network_interface": "eni-1" }))
            .unwrap_err();
        assert_eq!(err.violations()[0].kind, ErrorKind::CrossFieldViolation);
    }

    #[test]
    fn test_properties_and_attribute_map() {
        let definition = definition();
        let resource = definition.validate(&json!({ "instance": "i-1" })).unwrap();
        assert_eq!(resource.flag("attached_to_instance"), Some(true));
        assert_eq!(resource.property("missing"), None);

        let attributes = resource.to_attribute_map();
        assert_eq!(attributes.get("domain"), Some(&json!("vpc")));
        assert_eq!(attributes.get("attached_to_instance"), Some(&json!(true)));
    }

    #[test]
    fn test_properties_resolved_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let definition = definition().with_property(ComputedProperty::score("calls", move |_| {
            counter.fetch_add(1, Ordering::SeqCst) as f64
        }))
        .unwrap();
        let resource = definition.validate(&json!({ "network_interface": "eni-1" })).unwrap();

        assert_eq!(resource.score("calls"), Some(0.0));
        assert_eq!(resource.score("calls"), Some(0.0));
        resource.to_attribute_map();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_schema_rejected() {
        let schema = RecordSchema::new().field("weight", TypeNode::integer().range(0, 255).with_default(300));
        assert!(ResourceDefinition::new("bad", schema).is_err());
    }

    #[test]
    fn test_property_name_must_not_shadow_field() {
        let schema = RecordSchema::new().field("arn", TypeNode::string());
        let err = ResourceDefinition::new("role", schema)
            .unwrap()
            .with_property(ComputedProperty::flag("arn", |_| true))
            .unwrap_err();
        assert!(matches!(err, ResourceError::PropertyConflict { ref name, .. } if name == "arn"));

        let err = definition()
            .with_property(ComputedProperty::flag("attached_to_instance", |_| false))
            .unwrap_err();
        assert!(matches!(err, ResourceError::PropertyConflict { .. }));
    }

    #[test]
    fn test_pass_through_key_kept_over_property() {
        let schema = RecordSchema::new().lax().field("name", TypeNode::string());
        let definition = ResourceDefinition::new("role", schema)
            .unwrap()
            .with_property(ComputedProperty::flag("managed", |_| true))
            .unwrap();
        let resource = definition.validate(&json!({ "name": "x", "managed": "external" })).unwrap();
        let attributes = resource.to_attribute_map();
        assert_eq!(attributes.get("managed"), Some(&json!("external")));
        assert_eq!(resource.flag("managed"), Some(true));
    }

    #[test]
    fn test_validate_yaml() {
        let definition = definition();
        let resource = definition
            .validate_yaml("network_interface: eni-123\n", &ResolveContext::default())
            .unwrap();
        assert_eq!(resource.get_str("network_interface"), Some("eni-123"));
        assert!(definition.validate_yaml("{}", &ResolveContext::default()).is_err());
    }
}
