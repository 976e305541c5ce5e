//! Integration tests for the schema engine.

use std::fs;

use proptest::prelude::*;
use serde_json::{json, Value};
use tempfile::tempdir;
use tfshape_schema::{
    flatten, CustomConstraint, ErrorKind, ListSchema, MapSchema, RecordBuilder, RecordSchema, SchemaLoader,
    TypeNode, TypeRegistry,
};

fn weighted_schema() -> RecordSchema {
    RecordSchema::new()
        .field("weight", TypeNode::integer().range(0, 255))
        .field("domain", TypeNode::string_enum(["vpc", "standard"]).with_default("vpc"))
}

#[test]
fn test_numeric_range_bounds_are_inclusive() {
    let schema = weighted_schema();
    let builder = RecordBuilder::new(&schema);

    let record = builder.build(&json!({ "weight": 255 })).unwrap();
    assert_eq!(record.get_i64("weight"), Some(255));
    assert!(builder.build(&json!({ "weight": 0 })).is_ok());

    let err = builder.build(&json!({ "weight": 256 })).unwrap_err();
    assert_eq!(err.violations().len(), 1);
    assert_eq!(err.violations()[0].kind, ErrorKind::ConstraintViolation);
    assert_eq!(err.violations()[0].message, "must be within [0, 255], got 256");
}

#[test]
fn test_enum_default_applied_and_membership_enforced() {
    let schema = RecordSchema::new()
        .field("domain", TypeNode::string_enum(["vpc", "standard"]).with_default("vpc"));
    let builder = RecordBuilder::new(&schema);

    let record = builder.build(&json!({})).unwrap();
    assert_eq!(record.get_str("domain"), Some("vpc"));
    assert_eq!(record.to_attribute_map().get("domain"), Some(&json!("vpc")));

    let err = builder.build(&json!({ "domain": "classic" })).unwrap_err();
    assert_eq!(err.violations()[0].kind, ErrorKind::ConstraintViolation);
    assert!(err.violations()[0].message.contains("\"vpc\""));
    assert!(err.violations()[0].message.contains("\"standard\""));
}

#[test]
fn test_format_is_anchored() {
    let schema = RecordSchema::new().field("zone", TypeNode::string().format("Z[A-Z0-9]+").unwrap());
    let builder = RecordBuilder::new(&schema);
    assert!(builder.build(&json!({ "zone": "Z123ABC" })).is_ok());
    assert!(builder.build(&json!({ "zone": "xZ123" })).is_err());
    assert!(builder.build(&json!({ "zone": "Z123-abc" })).is_err());
}

#[test]
fn test_nested_violation_path_names_index_and_field() {
    let schema = RecordSchema::new().field(
        "items",
        ListSchema::of(RecordSchema::new().field("x", TypeNode::integer().range(0, 10))),
    );
    let err = RecordBuilder::new(&schema)
        .build(&json!({ "items": [{ "x": 1 }, { "x": 2 }, { "x": 99 }] }))
        .unwrap_err();
    assert_eq!(err.violations().len(), 1);
    assert_eq!(err.violations()[0].path.to_string(), "items[2].x");
    assert_eq!(err.at("items[2].x").len(), 1);
}

#[test]
fn test_all_field_violations_reported_together() {
    let schema = RecordSchema::new()
        .field("name", TypeNode::string())
        .field("ttl", TypeNode::integer())
        .field("records", ListSchema::of(TypeNode::string()).non_empty());
    let err = RecordBuilder::new(&schema)
        .build(&json!({ "ttl": "300", "records": [] }))
        .unwrap_err();

    assert_eq!(err.violations().len(), 3);
    assert!(err.has_kind(ErrorKind::MissingRequiredField));
    assert!(err.has_kind(ErrorKind::TypeMismatch));
    assert!(err.has_kind(ErrorKind::ConstraintViolation));

    let rendered = err.to_string();
    assert!(rendered.starts_with("3 validation error(s):"));
    assert_eq!(rendered.lines().count(), 4);
}

#[test]
fn test_first_failing_constraint_stops_field() {
    let schema = RecordSchema::new().field(
        "name",
        TypeNode::string().min_size(3).format("[a-z]+").unwrap(),
    );
    let err = RecordBuilder::new(&schema).build(&json!({ "name": "A" })).unwrap_err();
    assert_eq!(err.violations().len(), 1);
    assert!(err.violations()[0].message.starts_with("length must be at least 3"));
}

#[test]
fn test_strictness_boundary() {
    let strict = RecordSchema::new().field("name", TypeNode::string());
    let err = RecordBuilder::new(&strict)
        .build(&json!({ "name": "a", "vendor": { "x": 1 } }))
        .unwrap_err();
    assert_eq!(err.violations()[0].kind, ErrorKind::UnknownField);
    assert_eq!(err.violations()[0].path.to_string(), "vendor");

    let lax = RecordSchema::new().lax().field("name", TypeNode::string());
    let record = RecordBuilder::new(&lax)
        .build(&json!({ "name": "a", "vendor": { "x": 1 } }))
        .unwrap();
    assert_eq!(record.extra().get("vendor"), Some(&json!({ "x": 1 })));
    assert_eq!(record.lookup("vendor.x"), Some(&json!(1)));

    let attributes = record.into_attribute_map();
    let keys: Vec<_> = attributes.keys().cloned().collect();
    assert_eq!(keys, vec!["name", "vendor"]);
}

#[test]
fn test_null_treated_as_absent() {
    let schema = weighted_schema();
    let record = RecordBuilder::new(&schema)
        .build(&json!({ "weight": 1, "domain": null }))
        .unwrap();
    assert_eq!(record.get_str("domain"), Some("vpc"));
}

#[test]
fn test_custom_stage_normalizes_before_membership() {
    let schema = RecordSchema::new().field(
        "protocol",
        TypeNode::string()
            .custom(CustomConstraint::transform("lowercase", |v| {
                Ok(Value::String(v.as_str().unwrap_or_default().to_lowercase()))
            }))
            .included_in(["tcp", "udp"]),
    );
    let record = RecordBuilder::new(&schema).build(&json!({ "protocol": "TCP" })).unwrap();
    assert_eq!(record.get_str("protocol"), Some("tcp"));
}

#[test]
fn test_map_schema_limits() {
    let schema = RecordSchema::new().field(
        "tags",
        MapSchema::of(TypeNode::string().max_size(8))
            .key_format("[A-Za-z][A-Za-z0-9:_-]*")
            .unwrap()
            .max_entries(2),
    );
    let builder = RecordBuilder::new(&schema);
    assert!(builder.build(&json!({ "tags": { "Name": "web" } })).is_ok());

    let err = builder
        .build(&json!({ "tags": { "Name": "a-very-long-name", "9bad": "x", "Env": "prod" } }))
        .unwrap_err();
    let paths: Vec<_> = err.violations().iter().map(|v| v.path.to_string()).collect();
    assert_eq!(paths, vec!["tags", "tags.Name", "tags.9bad"]);
}

#[test]
fn test_flatten_after_build() {
    let schema = RecordSchema::new()
        .field("name", TypeNode::string())
        .field(
            "alias",
            RecordSchema::new()
                .field("zone_id", TypeNode::string())
                .field("evaluate_target_health", TypeNode::boolean().with_default(false))
                .optional(),
        );
    let record = RecordBuilder::new(&schema)
        .build(&json!({ "name": "www", "alias": { "zone_id": "Z1" } }))
        .unwrap();
    let flat = flatten(&schema, &record);
    assert_eq!(
        flat,
        vec![
            ("name".to_string(), json!("www")),
            ("alias.zone_id".to_string(), json!("Z1")),
            ("alias.evaluate_target_health".to_string(), json!(false)),
        ]
    );
}

#[test]
fn test_load_document_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("types.yaml");
    fs::write(
        &path,
        r#"
types:
  Weight:
    type: integer
    range: { min: 0, max: 255 }
  Endpoint:
    type: record
    fields:
      address: { type: string, custom: [ipv4] }
      weight: { ref: Weight, default: 1 }
"#,
    )
    .unwrap();

    let mut registry = TypeRegistry::new();
    let names = SchemaLoader::new().load_file(&path, &mut registry).unwrap();
    assert_eq!(names, vec!["Weight", "Endpoint"]);

    let endpoint = registry.get("Endpoint").unwrap();
    let tfshape_schema::Schema::Record(endpoint) = endpoint.as_ref() else {
        panic!("Endpoint should be a record");
    };
    let record = RecordBuilder::new(endpoint)
        .build(&json!({ "address": " 10.0.0.1 " }))
        .unwrap();
    assert_eq!(record.get_str("address"), Some("10.0.0.1"));
    assert_eq!(record.get_i64("weight"), Some(1));

    // Loading the same document again is a no-op.
    assert!(SchemaLoader::new().load_file(&path, &mut registry).is_ok());
    assert_eq!(registry.len(), 2);
}

fn property_schema() -> RecordSchema {
    RecordSchema::new()
        .field("name", TypeNode::string().min_size(1))
        .field("weight", TypeNode::integer().range(0, 255).with_default(1))
        .field("domain", TypeNode::string_enum(["vpc", "standard"]).with_default("vpc"))
        .field("ttl", TypeNode::integer().optional())
}

fn arbitrary_input() -> impl Strategy<Value = Value> {
    (
        proptest::option::of("[a-z]{0,6}"),
        proptest::option::of(-10i64..300),
        proptest::option::of(prop_oneof![Just("vpc"), Just("standard"), Just("classic")]),
        proptest::option::of(any::<i32>()),
        any::<bool>(),
    )
        .prop_map(|(name, weight, domain, ttl, extra)| {
            let mut object = serde_json::Map::new();
            if let Some(name) = name {
                object.insert("name".into(), json!(name));
            }
            if let Some(weight) = weight {
                object.insert("weight".into(), json!(weight));
            }
            if let Some(domain) = domain {
                object.insert("domain".into(), json!(domain));
            }
            if let Some(ttl) = ttl {
                object.insert("ttl".into(), json!(ttl));
            }
            if extra {
                object.insert("unexpected".into(), json!(true));
            }
            Value::Object(object)
        })
}

proptest! {
    #[test]
    fn prop_validation_is_deterministic(input in arbitrary_input()) {
        let schema = property_schema();
        let builder = RecordBuilder::new(&schema);
        prop_assert_eq!(builder.build(&input), builder.build(&input));
    }

    #[test]
    fn prop_explicit_defaults_match_omitted(name in "[a-z]{1,6}", ttl in proptest::option::of(0i64..86400)) {
        let schema = property_schema();
        let builder = RecordBuilder::new(&schema);

        let mut omitted = json!({ "name": name });
        if let Some(ttl) = ttl {
            omitted["ttl"] = json!(ttl);
        }
        let mut explicit = omitted.clone();
        explicit["weight"] = json!(1);
        explicit["domain"] = json!("vpc");

        prop_assert_eq!(builder.build(&omitted).unwrap(), builder.build(&explicit).unwrap());
    }

    #[test]
    fn prop_defaulted_fields_never_missing(input in arbitrary_input()) {
        let schema = property_schema();
        if let Err(err) = RecordBuilder::new(&schema).build(&input) {
            for violation in err.violations() {
                if violation.kind == ErrorKind::MissingRequiredField {
                    prop_assert_eq!(violation.path.to_string(), "name");
                }
            }
        }
    }
}
