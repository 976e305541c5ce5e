//! `aws_lambda_permission`.

use tfshape_resource::{
    ArnTemplate, ComputedProperty, Condition, CrossFieldRule, PropertyValue, Requirement, ResolveContext,
    ResourceDefinition, ResourceResult,
};
use tfshape_schema::{Record, RecordSchema, TypeNode};

use crate::types::canonical;

pub const RESOURCE_TYPE: &str = "aws_lambda_permission";

const FUNCTION_URL_ACTION: &str = "lambda:InvokeFunctionUrl";

/// Account a principal or source refers to, if it names one.
fn principal_account(principal: &str) -> Option<&str> {
    if principal.len() == 12 && principal.chars().all(|c| c.is_ascii_digit()) {
        return Some(principal);
    }
    // arn:partition:iam::ACCOUNT:root
    let mut parts = principal.splitn(6, ':');
    match (parts.next(), parts.nth(3)) {
        (Some("arn"), Some(account)) if !account.is_empty() => Some(account),
        _ => None,
    }
}

fn is_cross_account(record: &Record, context: &ResolveContext) -> bool {
    let Some(own) = context.account_id.as_deref() else {
        return false;
    };
    let principal = record.get_str("principal").and_then(principal_account);
    let source = record.get_str("source_account");
    principal.is_some_and(|a| a != own) || source.is_some_and(|a| a != own)
}

/// Build the definition.
pub fn definition() -> ResourceResult<ResourceDefinition> {
    let schema = RecordSchema::new()
        .field("action", canonical("LambdaPermissionAction")?)
        .field("function_name", TypeNode::string().size(1, 256))
        .field("principal", TypeNode::string().min_size(1))
        .field("qualifier", TypeNode::string().optional())
        .field("statement_id", TypeNode::string().format("[A-Za-z0-9_-]{1,100}")?.optional())
        .field("statement_id_prefix", TypeNode::string().max_size(100).optional())
        .field("source_arn", canonical("Arn")?.optional())
        .field("source_account", canonical("AwsAccountId")?.optional())
        .field("principal_org_id", TypeNode::string().format("o-[a-z0-9]{10,32}")?.optional())
        .field("event_source_token", TypeNode::string().optional())
        .field("function_url_auth_type", TypeNode::string_enum(["AWS_IAM", "NONE"]).optional());

    let function_arn = ArnTemplate::new("lambda", "function:{function_name}");

    Ok(ResourceDefinition::new(RESOURCE_TYPE, schema)?
        .with_rule(CrossFieldRule::mutually_exclusive(["statement_id", "statement_id_prefix"]))
        .with_rule(CrossFieldRule::when(
            "function_url_auth",
            Condition::equals("action", FUNCTION_URL_ACTION),
            Requirement::AllPresent(vec!["function_url_auth_type".into()]),
        ))
        .with_rule(CrossFieldRule::check("function_url_auth_action", |record| {
            if record.contains("function_url_auth_type") && record.get_str("action") != Some(FUNCTION_URL_ACTION) {
                Err(format!("function_url_auth_type only applies to {}", FUNCTION_URL_ACTION))
            } else {
                Ok(())
            }
        }))
        .with_property(ComputedProperty::identifier("function_arn", move |record, context| {
            match record.get_str("function_name") {
                Some(name) if name.starts_with("arn:") => Some(name.to_string()),
                _ => function_arn.render(record, context),
            }
        }))?
        .with_property(ComputedProperty::flag("is_service_principal", |r| {
            r.get_str("principal").is_some_and(|p| p.ends_with(".amazonaws.com"))
        }))?
        .with_property(ComputedProperty::new("is_cross_account", |record, context| {
            PropertyValue::Flag(is_cross_account(record, context))
        }))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_principal_account() {
        assert_eq!(principal_account("123456789012"), Some("123456789012"));
        assert_eq!(principal_account("arn:aws:iam::210987654321:root"), Some("210987654321"));
        assert_eq!(principal_account("s3.amazonaws.com"), None);
    }
}
