//! Integration tests for resource definitions.

use std::fs;

use proptest::prelude::*;
use serde_json::json;
use tempfile::tempdir;
use tfshape_resource::{
    ArnTemplate, Classifier, ComputedProperty, Condition, CrossFieldRule, Partition, ResolveContext,
    ResourceDefinition,
};
use tfshape_schema::{ErrorKind, ListSchema, RecordSchema, TypeNode};

fn attachment() -> ResourceDefinition {
    let schema = RecordSchema::new()
        .field("instance", TypeNode::string().optional())
        .field("network_interface", TypeNode::string().optional())
        .field("associate_with_private_ip", TypeNode::string().optional());
    ResourceDefinition::new("attachment", schema)
        .unwrap()
        .with_rule(CrossFieldRule::exactly_one_of(["instance", "network_interface"]))
        .with_rule(CrossFieldRule::requires("associate_with_private_ip", ["network_interface"]))
}

#[test]
fn test_exactly_one_of_instance_or_interface() {
    let definition = attachment();

    let neither = definition.validate(&json!({})).unwrap_err();
    assert_eq!(neither.violations().len(), 1);
    assert_eq!(neither.violations()[0].kind, ErrorKind::CrossFieldViolation);

    let both = definition
        .validate(&json!({ "instance": "i-1", "network_interface": "eni-1" }))
        .unwrap_err();
    assert_eq!(both.violations()[0].kind, ErrorKind::CrossFieldViolation);
    assert!(both.violations()[0].message.contains("instance and network_interface"));

    assert!(definition.validate(&json!({ "instance": "i-1" })).is_ok());
    assert!(definition.validate(&json!({ "network_interface": "eni-1" })).is_ok());
}

#[test]
fn test_cross_field_violations_aggregated() {
    let err = attachment()
        .validate(&json!({ "instance": "i-1", "network_interface": "eni-1", "associate_with_private_ip": "10.0.0.5" }))
        .unwrap_err();
    assert_eq!(err.violations().len(), 1);

    let err = attachment()
        .validate(&json!({ "associate_with_private_ip": "10.0.0.5" }))
        .unwrap_err();
    assert_eq!(err.violations().len(), 2);
    assert!(err.violations().iter().all(|v| v.kind == ErrorKind::CrossFieldViolation));
    assert_eq!(
        err.violations()[1].message,
        "network_interface must be set when associate_with_private_ip is set"
    );
}

#[test]
fn test_field_violations_short_circuit_rules() {
    let err = attachment()
        .validate(&json!({ "instance": 7, "network_interface": "eni-1" }))
        .unwrap_err();
    assert_eq!(err.violations().len(), 1);
    assert_eq!(err.violations()[0].kind, ErrorKind::TypeMismatch);
}

fn role_definition() -> ResourceDefinition {
    let schema = RecordSchema::new()
        .field("name", TypeNode::string())
        .field("path", TypeNode::string().with_default("/"))
        .field("managed_policy_arns", ListSchema::of(TypeNode::string()).optional());
    let classifier = Classifier::new("service")
        .rule("administrative", Condition::matches("name", "(?i)admin").unwrap())
        .rule("operations", Condition::matches("name", "(?i)ops|operations").unwrap())
        .rule("developer", Condition::matches("name", "(?i)dev").unwrap());
    ResourceDefinition::new("role", schema)
        .unwrap()
        .with_property(ComputedProperty::category("category", classifier))
        .unwrap()
        .with_property(ComputedProperty::arn(
            "arn",
            ArnTemplate::new("iam", "role{path}{name}").global(),
        ))
        .unwrap()
}

#[test]
fn test_category_precedence_is_explicit() {
    let definition = role_definition();
    let cases = [
        ("platform-admin-ops", "administrative"),
        ("devops-runner", "operations"),
        ("dev-sandbox", "developer"),
        ("batch-worker", "service"),
    ];
    for (name, expected) in cases {
        let resource = definition.validate(&json!({ "name": name })).unwrap();
        assert_eq!(resource.category("category"), Some(expected), "{}", name);
    }
}

#[test]
fn test_arn_uses_context_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("context.yaml");
    fs::write(&path, "partition: aws-us-gov\nregion: us-gov-west-1\naccount_id: \"123456789012\"\n").unwrap();
    let context = ResolveContext::from_file(&path).unwrap();
    assert_eq!(context.partition, Partition::AwsUsGov);

    let definition = role_definition();
    let resource = definition
        .validate_with(&json!({ "name": "deployer", "path": "/ci/" }), &context)
        .unwrap();
    assert_eq!(
        resource.identifier("arn"),
        Some("arn:aws-us-gov:iam::123456789012:role/ci/deployer")
    );

    // Without an account id the ARN cannot be derived and is left out.
    let resource = definition.validate(&json!({ "name": "deployer" })).unwrap();
    assert!(resource.property("arn").unwrap().is_unset());
    assert!(!resource.to_attribute_map().contains_key("arn"));
    assert_eq!(resource.to_attribute_map().get("category"), Some(&json!("service")));
}

fn exclusive_pair() -> ResourceDefinition {
    let schema = RecordSchema::new()
        .field("a", TypeNode::string().optional())
        .field("b", TypeNode::string().optional())
        .field("c", TypeNode::integer().optional());
    ResourceDefinition::new("pair", schema)
        .unwrap()
        .with_rule(CrossFieldRule::mutually_exclusive(["a", "b"]))
}

proptest! {
    #[test]
    fn prop_mutual_exclusion_laws(a in "[a-z]{1,8}", b in "[a-z]{1,8}", c in proptest::option::of(any::<i32>())) {
        let definition = exclusive_pair();
        let mut both = json!({ "a": a, "b": b });
        let mut only_a = json!({ "a": a });
        let mut only_b = json!({ "b": b });
        if let Some(c) = c {
            both["c"] = json!(c);
            only_a["c"] = json!(c);
            only_b["c"] = json!(c);
        }

        let err = definition.validate(&both).unwrap_err();
        prop_assert!(err.has_kind(ErrorKind::CrossFieldViolation));
        prop_assert!(definition.validate(&only_a).is_ok());
        prop_assert!(definition.validate(&only_b).is_ok());
    }
}
