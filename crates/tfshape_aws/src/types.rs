//! Canonical AWS types, loaded once per process.

use std::sync::{Arc, OnceLock};

use tracing::info;

use tfshape_schema::{DocumentFormat, Schema, SchemaLoader, SchemaResult, TypeRegistry};

/// Source of the canonical type document.
pub const CANONICAL_TYPES: &str = include_str!("../schemas/canonical.yaml");

static CANONICAL: OnceLock<Arc<TypeRegistry>> = OnceLock::new();

/// The shared registry of canonical types.
///
/// The document is compiled on first use and the frozen registry is reused
/// afterwards.
pub fn canonical_types() -> SchemaResult<Arc<TypeRegistry>> {
    if let Some(registry) = CANONICAL.get() {
        return Ok(registry.clone());
    }
    let mut registry = TypeRegistry::new();
    let names = SchemaLoader::new().load_str(CANONICAL_TYPES, DocumentFormat::Yaml, &mut registry)?;
    info!("Loaded {} canonical AWS type(s)", names.len());
    Ok(CANONICAL.get_or_init(|| registry.freeze()).clone())
}

/// A reference to the canonical type `name`.
pub fn canonical(name: &str) -> SchemaResult<Schema> {
    canonical_types()?.reference(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tfshape_schema::{RecordBuilder, RecordSchema};

    #[test]
    fn test_canonical_types_load_once() {
        let first = canonical_types().unwrap();
        let second = canonical_types().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        for name in ["AwsRegion", "Ec2InstanceType", "LambdaPermissionAction", "CidrBlock", "Tags", "BgpAsn"] {
            assert!(first.contains(name), "{} missing", name);
        }
    }

    #[test]
    fn test_lambda_action_includes_wildcard() {
        let schema = RecordSchema::new().field("action", canonical("LambdaPermissionAction").unwrap());
        let builder = RecordBuilder::new(&schema);
        assert!(builder.build(&json!({ "action": "lambda:*" })).is_ok());
        assert!(builder.build(&json!({ "action": "lambda:InvokeFunction" })).is_ok());
        assert!(builder.build(&json!({ "action": "s3:GetObject" })).is_err());
    }

    #[test]
    fn test_canonical_formats() {
        let schema = RecordSchema::new()
            .field("region", canonical("AwsRegion").unwrap().optional())
            .field("instance_type", canonical("Ec2InstanceType").unwrap().optional())
            .field("tags", canonical("Tags").unwrap().optional())
            .field("asn", canonical("BgpAsn").unwrap().optional());
        let builder = RecordBuilder::new(&schema);
        assert!(builder
            .build(&json!({
                "region": "us-gov-west-1",
                "instance_type": "m5.2xlarge",
                "tags": { "Name": "web", "team:owner": "platform" },
                "asn": 65000
            }))
            .is_ok());

        let err = builder
            .build(&json!({ "region": "mars-1", "instance_type": "huge", "asn": 23456 }))
            .unwrap_err();
        let paths: Vec<_> = err.violations().iter().map(|v| v.path.to_string()).collect();
        assert_eq!(paths, vec!["region", "instance_type", "asn"]);
    }
}
