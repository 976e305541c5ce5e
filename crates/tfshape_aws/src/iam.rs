//! `aws_iam_role`.

use serde_json::Value;

use tfshape_resource::{
    ArnTemplate, Classifier, ComputedProperty, Condition, CrossFieldRule, ResourceDefinition, ResourceResult,
};
use tfshape_schema::{ListSchema, Record, RecordSchema, TypeNode};

use crate::types::canonical;

pub const RESOURCE_TYPE: &str = "aws_iam_role";

const ADMINISTRATOR_ACCESS: &str = "arn:aws:iam::aws:policy/AdministratorAccess";

fn has_managed_policy(record: &Record, arn: &str) -> bool {
    record
        .get_list("managed_policy_arns")
        .is_some_and(|arns| arns.iter().any(|a| a.as_str() == Some(arn)))
}

/// Role categories, highest precedence first:
/// administrative > operations > developer > readonly, falling back to `service`.
///
/// A role named `dev-ops-admin` is administrative; `devops-deployer` is operations.
pub fn role_classifier() -> ResourceResult<Classifier> {
    Ok(Classifier::new("service")
        .rule(
            "administrative",
            Condition::predicate(|r| has_managed_policy(r, ADMINISTRATOR_ACCESS)),
        )
        .rule("administrative", Condition::matches("name", r"(?i)admin")?)
        .rule("operations", Condition::matches("name", r"(?i)ops|operations|sre|oncall")?)
        .rule("developer", Condition::matches("name", r"(?i)dev|engineer")?)
        .rule("readonly", Condition::matches("name", r"(?i)read-?only|viewer|audit")?))
}

/// Whether the trust policy lets an AWS service assume the role.
fn trusts_service(record: &Record) -> bool {
    let Some(document) = record
        .get_str("assume_role_policy")
        .and_then(|text| serde_json::from_str::<Value>(text).ok())
    else {
        return false;
    };
    let statements = match document.get("Statement") {
        Some(Value::Array(statements)) => statements.clone(),
        Some(statement) => vec![statement.clone()],
        None => Vec::new(),
    };
    statements
        .iter()
        .any(|s| s.get("Principal").and_then(|p| p.get("Service")).is_some())
}

/// Build the definition.
pub fn definition() -> ResourceResult<ResourceDefinition> {
    let schema = RecordSchema::new()
        .field("name", TypeNode::string().format(r"[\w+=,.@-]{1,64}")?)
        .field("path", TypeNode::string().format(r"/([\x21-\x7E]*/)?")?.with_default("/"))
        .field("assume_role_policy", canonical("JsonPolicyDocument")?)
        .field("description", TypeNode::string().max_size(1000).optional())
        .field("max_session_duration", TypeNode::integer().range(3600, 43200).with_default(3600))
        .field("permissions_boundary", canonical("Arn")?.optional())
        .field("managed_policy_arns", ListSchema::of(canonical("Arn")?).max_size(20).optional())
        .field("force_detach_policies", TypeNode::boolean().with_default(false))
        .field("tags", canonical("Tags")?.optional());

    Ok(ResourceDefinition::new(RESOURCE_TYPE, schema)?
        .with_rule(CrossFieldRule::check("boundary_not_attached", |record| {
            match record.get_str("permissions_boundary") {
                Some(boundary) if has_managed_policy(record, boundary) => Err(format!(
                    "permissions_boundary {} is also listed in managed_policy_arns",
                    boundary
                )),
                _ => Ok(()),
            }
        }))
        .with_property(ComputedProperty::category("category", role_classifier()?))?
        .with_property(ComputedProperty::arn(
            "arn",
            ArnTemplate::new("iam", "role{path}{name}").global(),
        ))?
        .with_property(ComputedProperty::flag("is_service_role", trusts_service))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TRUST: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":{"Service":"ec2.amazonaws.com"},"Action":"sts:AssumeRole"}]}"#;

    #[test]
    fn test_managed_admin_policy_outranks_name() {
        let definition = definition().unwrap();
        let resource = definition
            .validate(&json!({
                "name": "ci-readonly",
                "assume_role_policy": TRUST,
                "managed_policy_arns": [ADMINISTRATOR_ACCESS]
            }))
            .unwrap();
        assert_eq!(resource.category("category"), Some("administrative"));
        assert_eq!(resource.flag("is_service_role"), Some(true));
    }

    #[test]
    fn test_invalid_trust_policy() {
        let err = definition()
            .unwrap()
            .validate(&json!({ "name": "x", "assume_role_policy": "not json" }))
            .unwrap_err();
        assert_eq!(err.violations()[0].path.to_string(), "assume_role_policy");
    }
}
