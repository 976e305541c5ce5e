//! # tfshape_aws
//!
//! Canonical AWS types and a set of resource definitions built with
//! [`tfshape_schema`] and [`tfshape_resource`].
//!
//! Shared types (`AwsRegion`, `Ec2InstanceType`, `LambdaPermissionAction`, ...) are
//! declared once in `schemas/canonical.yaml` and referenced by name from every
//! resource.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//!
//! let record = tfshape_aws::route53::definition().unwrap();
//! let resource = record
//!     .validate(&json!({
//!         "name": "www.example.com",
//!         "type": "A",
//!         "ttl": 300,
//!         "records": ["203.0.113.1"]
//!     }))
//!     .unwrap();
//! assert_eq!(resource.get_i64("ttl"), Some(300));
//! ```

pub mod ec2;
pub mod iam;
pub mod lambda;
pub mod route53;
pub mod types;

pub use types::{canonical, canonical_types};

use tfshape_resource::{ResourceDefinition, ResourceResult};

/// Every resource definition in this crate.
pub fn definitions() -> ResourceResult<Vec<ResourceDefinition>> {
    Ok(vec![
        route53::definition()?,
        ec2::eip()?,
        ec2::instance()?,
        ec2::security_group_rule()?,
        lambda::definition()?,
        iam::definition()?,
    ])
}
