//! `aws_route53_record`.

use std::sync::Arc;

use tfshape_resource::{
    Classifier, ComputedProperty, Condition, CrossFieldRule, Requirement, ResourceDefinition, ResourceResult,
};
use tfshape_schema::{ListSchema, Record, RecordSchema, TypeNode};

use crate::types::canonical;

pub const RESOURCE_TYPE: &str = "aws_route53_record";

const RECORD_TYPES: [&str; 13] = [
    "A", "AAAA", "CAA", "CNAME", "DS", "MX", "NAPTR", "NS", "PTR", "SOA", "SPF", "SRV", "TXT",
];

/// Routing policy blocks, highest classification precedence first.
const ROUTING_POLICIES: [(&str, &str); 4] = [
    ("failover_routing_policy", "failover"),
    ("weighted_routing_policy", "weighted"),
    ("latency_routing_policy", "latency"),
    ("geolocation_routing_policy", "geolocation"),
];

fn schema() -> ResourceResult<RecordSchema> {
    let alias = RecordSchema::new()
        .field("name", TypeNode::string().min_size(1))
        .field("zone_id", TypeNode::string().min_size(1))
        .field("evaluate_target_health", TypeNode::boolean().with_default(false))
        .optional();

    Ok(RecordSchema::new()
        .field("zone_id", TypeNode::string().min_size(1).optional())
        .field("name", TypeNode::string().size(1, 255))
        .field("type", TypeNode::string_enum(RECORD_TYPES))
        .field("ttl", canonical("Ttl")?.optional())
        .field("records", ListSchema::of(TypeNode::string().min_size(1)).non_empty().optional())
        .field("set_identifier", TypeNode::string().size(1, 128).optional())
        .field("health_check_id", TypeNode::string().optional())
        .field("allow_overwrite", TypeNode::boolean().optional())
        .field("alias", alias)
        .field(
            "failover_routing_policy",
            RecordSchema::new()
                .field("type", TypeNode::string_enum(["PRIMARY", "SECONDARY"]))
                .optional(),
        )
        .field(
            "weighted_routing_policy",
            RecordSchema::new().field("weight", canonical("RoutingWeight")?).optional(),
        )
        .field(
            "latency_routing_policy",
            RecordSchema::new().field("region", canonical("AwsRegion")?).optional(),
        )
        .field(
            "geolocation_routing_policy",
            RecordSchema::new()
                .field("continent", TypeNode::string_enum(["AF", "AN", "AS", "EU", "OC", "NA", "SA"]).optional())
                .field("country", TypeNode::string().format("[A-Z]{2}|\\*")?.optional())
                .field("subdivision", TypeNode::string().optional())
                .optional(),
        ))
}

/// Build the definition.
///
/// Alias records take their target and TTL from the aliased resource, so `alias`
/// excludes `ttl` and `records`; every other record needs both. Routing policies are
/// mutually exclusive and each requires a `set_identifier`.
pub fn definition() -> ResourceResult<ResourceDefinition> {
    let policies: Vec<&str> = ROUTING_POLICIES.iter().map(|(field, _)| *field).collect();

    let routing = ROUTING_POLICIES
        .iter()
        .fold(Classifier::new("simple"), |classifier, (field, category)| {
            classifier.rule(*category, Condition::present(*field))
        });

    Ok(ResourceDefinition::new(RESOURCE_TYPE, schema()?)?
        .with_rule(CrossFieldRule::conflicts("alias", ["ttl", "records"]))
        .with_rule(CrossFieldRule::when(
            "simple_record_target",
            Condition::absent("alias"),
            Requirement::AllPresent(vec!["ttl".into(), "records".into()]),
        ))
        .with_rule(CrossFieldRule::mutually_exclusive(policies.clone()))
        .with_rule(CrossFieldRule::when(
            "routing_policy_identifier",
            Condition::any_present(policies.clone()),
            Requirement::AllPresent(vec!["set_identifier".into()]),
        ))
        .with_rule(CrossFieldRule::requires("health_check_id", ["set_identifier"]))
        .with_rule(
            CrossFieldRule::when(
                "set_identifier_policy",
                Condition::present("set_identifier"),
                Requirement::AtLeastOneOf(policies.iter().map(|p| p.to_string()).collect()),
            )
            .with_message("set_identifier is only valid together with a routing policy"),
        )
        .with_rule(
            CrossFieldRule::when(
                "cname_single_value",
                Condition::equals("type", "CNAME"),
                Requirement::Check(Arc::new(|record: &Record| {
                    match record.get_list("records") {
                        Some(records) if records.len() > 1 => {
                            Err(format!("CNAME records take exactly one value, got {}", records.len()))
                        }
                        _ => Ok(()),
                    }
                })),
            ),
        )
        .with_property(ComputedProperty::flag("is_alias", |r| r.contains("alias")))?
        .with_property(ComputedProperty::category("routing_policy", routing))?
        .with_property(ComputedProperty::identifier("fqdn", |r, _| {
            r.get_str("name")
                .map(|name| format!("{}.", name.trim_end_matches('.').to_lowercase()))
        }))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tfshape_schema::ErrorKind;

    #[test]
    fn test_weighted_record() {
        let definition = definition().unwrap();
        let resource = definition
            .validate(&json!({
                "name": "API.example.com",
                "type": "CNAME",
                "ttl": 60,
                "records": ["lb.example.com"],
                "set_identifier": "blue",
                "weighted_routing_policy": { "weight": 10 }
            }))
            .unwrap();
        assert_eq!(resource.category("routing_policy"), Some("weighted"));
        assert_eq!(resource.identifier("fqdn"), Some("api.example.com."));
        assert_eq!(resource.flag("is_alias"), Some(false));
    }

    #[test]
    fn test_routing_policy_rules() {
        let definition = definition().unwrap();
        let err = definition
            .validate(&json!({
                "name": "api.example.com",
                "type": "A",
                "ttl": 60,
                "records": ["203.0.113.1"],
                "weighted_routing_policy": { "weight": 10 },
                "failover_routing_policy": { "type": "PRIMARY" }
            }))
            .unwrap_err();
        let messages: Vec<_> = err.violations().iter().map(|v| v.message.as_str()).collect();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], "failover_routing_policy and weighted_routing_policy are mutually exclusive");
        assert!(messages[1].starts_with("set_identifier must be set when any of"));
        assert!(err.violations().iter().all(|v| v.kind == ErrorKind::CrossFieldViolation));
    }

    #[test]
    fn test_cname_takes_one_value() {
        let err = definition()
            .unwrap()
            .validate(&json!({
                "name": "www.example.com",
                "type": "CNAME",
                "ttl": 60,
                "records": ["a.example.com", "b.example.com"]
            }))
            .unwrap_err();
        assert_eq!(err.violations()[0].message, "CNAME records take exactly one value, got 2");
    }
}
