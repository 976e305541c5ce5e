//! EC2 resources: `aws_eip`, `aws_instance` and `aws_security_group_rule`.

use serde_json::Value;

use tfshape_resource::{
    Classifier, ComputedProperty, Condition, CrossFieldRule, Requirement, ResourceDefinition, ResourceResult,
};
use tfshape_schema::builtin::lowercase;
use tfshape_schema::{CustomConstraint, ListSchema, Record, RecordSchema, TypeNode};

use crate::types::canonical;

pub const EIP: &str = "aws_eip";
pub const INSTANCE: &str = "aws_instance";
pub const SECURITY_GROUP_RULE: &str = "aws_security_group_rule";

fn resource_id(prefix: &str) -> ResourceResult<TypeNode> {
    Ok(TypeNode::string().format(&format!("{}-[0-9a-f]{{8,17}}", prefix))?)
}

/// `aws_eip`: an address attached to at most one instance or network interface.
pub fn eip() -> ResourceResult<ResourceDefinition> {
    let schema = RecordSchema::new()
        .field("domain", TypeNode::string_enum(["vpc", "standard"]).with_default("vpc"))
        .field("instance", resource_id("i")?.optional())
        .field("network_interface", resource_id("eni")?.optional())
        .field("associate_with_private_ip", canonical("Ipv4Address")?.optional())
        .field("public_ipv4_pool", TypeNode::string().optional())
        .field("customer_owned_ipv4_pool", TypeNode::string().optional())
        .field("tags", canonical("Tags")?.optional());

    let attachment = Classifier::new("unattached")
        .rule("instance", Condition::present("instance"))
        .rule("network_interface", Condition::present("network_interface"));

    Ok(ResourceDefinition::new(EIP, schema)?
        .with_rule(CrossFieldRule::mutually_exclusive(["instance", "network_interface"]))
        .with_rule(CrossFieldRule::requires("associate_with_private_ip", ["network_interface"]))
        .with_rule(CrossFieldRule::conflicts("customer_owned_ipv4_pool", ["public_ipv4_pool"]))
        .with_property(ComputedProperty::flag("is_vpc", |r| r.get_str("domain") == Some("vpc")))?
        .with_property(ComputedProperty::category("attachment", attachment))?)
}

/// `aws_instance` (commonly used attributes).
pub fn instance() -> ResourceResult<ResourceDefinition> {
    let root_block_device = RecordSchema::new()
        .field("volume_size", TypeNode::integer().range(1, 16384).optional())
        .field(
            "volume_type",
            TypeNode::string_enum(["gp2", "gp3", "io1", "io2", "st1", "sc1", "standard"]).with_default("gp3"),
        )
        .field("encrypted", TypeNode::boolean().with_default(false))
        .field("delete_on_termination", TypeNode::boolean().with_default(true))
        .optional();

    let schema = RecordSchema::new()
        .field("ami", resource_id("ami")?)
        .field("instance_type", canonical("Ec2InstanceType")?)
        .field("subnet_id", resource_id("subnet")?.optional())
        .field("vpc_security_group_ids", ListSchema::of(resource_id("sg")?).max_size(5).optional())
        .field("associate_public_ip_address", TypeNode::boolean().optional())
        .field("private_ip", canonical("Ipv4Address")?.optional())
        .field("user_data", TypeNode::string().max_size(16384).optional())
        .field("user_data_base64", canonical("Base64Document")?.optional())
        .field("monitoring", TypeNode::boolean().with_default(false))
        .field("ebs_optimized", TypeNode::boolean().optional())
        .field("root_block_device", root_block_device)
        .field("tags", canonical("Tags")?.optional());

    Ok(ResourceDefinition::new(INSTANCE, schema)?
        .with_rule(CrossFieldRule::mutually_exclusive(["user_data", "user_data_base64"]))
        .with_property(ComputedProperty::flag("is_public", |r| {
            r.get_bool("associate_public_ip_address").unwrap_or(false)
        }))?
        .with_property(ComputedProperty::identifier("instance_family", |r, _| {
            r.get_str("instance_type")
                .and_then(|t| t.split('.').next())
                .map(str::to_string)
        }))?
        .with_property(ComputedProperty::flag("is_burstable", |r| {
            r.get_str("instance_type").is_some_and(|t| t.starts_with('t'))
        }))?)
}

const OPEN_CIDRS: [&str; 2] = ["0.0.0.0/0", "::/0"];
const SENSITIVE_PORTS: [i64; 6] = [22, 3389, 3306, 5432, 1433, 27017];

fn port_order() -> CustomConstraint {
    CustomConstraint::new("port_order", |value, ctx| {
        let from = ctx.sibling("from_port").and_then(Value::as_i64);
        match (from, value.as_i64()) {
            (Some(from), Some(to)) if to < from => Err(format!("must not be lower than from_port ({})", from)),
            _ => Ok(value.clone()),
        }
    })
}

fn is_open_to_world(record: &Record) -> bool {
    ["cidr_blocks", "ipv6_cidr_blocks"].iter().any(|field| {
        record
            .get_list(field)
            .is_some_and(|blocks| blocks.iter().any(|b| b.as_str().is_some_and(|b| OPEN_CIDRS.contains(&b))))
    })
}

fn is_public_ingress(record: &Record) -> bool {
    record.get_str("type") == Some("ingress") && is_open_to_world(record)
}

/// Exposure score in `[0, 100]`.
///
/// Public ingress contributes 50, all protocols 20, a range spanning every port
/// 10 and a publicly reachable administrative or database port 20.
fn risk_score(record: &Record) -> f64 {
    let public = is_public_ingress(record);
    let from = record.get_i64("from_port").unwrap_or(0);
    let to = record.get_i64("to_port").unwrap_or(0);
    let all_protocols = matches!(record.get_str("protocol"), Some("-1") | Some("all"));

    let mut score = 0.0;
    if public {
        score += 50.0;
    }
    if all_protocols {
        score += 20.0;
    }
    if all_protocols || (from <= 0 && to >= 65535) {
        score += 10.0;
    }
    if public && (all_protocols || SENSITIVE_PORTS.iter().any(|p| (from..=to).contains(p))) {
        score += 20.0;
    }
    f64::min(score, 100.0)
}

/// `aws_security_group_rule`.
pub fn security_group_rule() -> ResourceResult<ResourceDefinition> {
    let schema = RecordSchema::new()
        .field("type", TypeNode::string_enum(["ingress", "egress"]))
        .field("security_group_id", resource_id("sg")?)
        .field(
            "protocol",
            TypeNode::string()
                .custom(lowercase())
                .included_in(["tcp", "udp", "icmp", "icmpv6", "all", "-1"]),
        )
        .field("from_port", canonical("Port")?)
        .field("to_port", TypeNode::integer().range(-1, 65535).custom(port_order()))
        .field("cidr_blocks", ListSchema::of(canonical("CidrBlock")?).optional())
        .field("ipv6_cidr_blocks", ListSchema::of(canonical("CidrBlock")?).optional())
        .field("prefix_list_ids", ListSchema::of(TypeNode::string()).optional())
        .field("source_security_group_id", resource_id("sg")?.optional())
        .field("self", TypeNode::boolean().with_default(false))
        .field("description", TypeNode::string().max_size(255).optional());

    let sources = ["cidr_blocks", "ipv6_cidr_blocks", "prefix_list_ids", "source_security_group_id"];

    Ok(ResourceDefinition::new(SECURITY_GROUP_RULE, schema)?
        .with_rule(CrossFieldRule::check("rule_source", move |record| {
            if record.get_bool("self") == Some(true) || sources.iter().any(|f| record.contains(f)) {
                Ok(())
            } else {
                Err(format!("one of {} or self = true must be set", sources.join(", ")))
            }
        }))
        .with_rule(CrossFieldRule::conflicts(
            "source_security_group_id",
            ["cidr_blocks", "ipv6_cidr_blocks"],
        ))
        .with_rule(CrossFieldRule::when(
            "self_source",
            Condition::equals("self", true),
            Requirement::AllAbsent(vec!["source_security_group_id".into()]),
        ))
        .with_property(ComputedProperty::flag("is_public", is_public_ingress))?
        .with_property(ComputedProperty::score("risk_score", risk_score))?)
}
