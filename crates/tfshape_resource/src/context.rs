//! Resolve context: where a resource lives, for identifiers such as ARNs.

use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// AWS partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Partition {
    #[default]
    Aws,
    AwsCn,
    AwsUsGov,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Aws => "aws",
            Partition::AwsCn => "aws-cn",
            Partition::AwsUsGov => "aws-us-gov",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "aws" => Some(Partition::Aws),
            "aws-cn" => Some(Partition::AwsCn),
            "aws-us-gov" => Some(Partition::AwsUsGov),
            _ => None,
        }
    }

    /// Partition a region belongs to.
    pub fn from_region(region: &str) -> Self {
        if region.starts_with("cn-") {
            Partition::AwsCn
        } else if region.starts_with("us-gov-") {
            Partition::AwsUsGov
        } else {
            Partition::Aws
        }
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Partition, region and account used when deriving identifiers.
///
/// ```yaml
/// partition: aws
/// region: eu-west-1
/// account_id: "123456789012"
/// ```
///
/// When `partition` is left out it follows the region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ContextFile")]
pub struct ResolveContext {
    pub partition: Partition,
    pub region: String,
    pub account_id: Option<String>,
}

/// On-disk form of [`ResolveContext`], every key optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ContextFile {
    partition: Option<Partition>,
    region: Option<String>,
    account_id: Option<String>,
}

impl From<ContextFile> for ResolveContext {
    fn from(file: ContextFile) -> Self {
        let mut context = match file.region {
            Some(region) => Self::new(region),
            None => Self::default(),
        };
        if let Some(partition) = file.partition {
            context.partition = partition;
        }
        context.account_id = file.account_id;
        context
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self {
            partition: Partition::Aws,
            region: "us-east-1".to_string(),
            account_id: None,
        }
    }
}

impl ResolveContext {
    /// Context for `region`, with the partition derived from it.
    pub fn new(region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            partition: Partition::from_region(&region),
            region,
            account_id: None,
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = partition;
        self
    }

    pub fn from_yaml_str(text: &str) -> ResourceResult<Self> {
        let context: Self = serde_yaml::from_str(text)?;
        context.validate()?;
        Ok(context)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let path = path.as_ref();
        debug!("Loading resolve context from {:?}", path);
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Read `AWS_PARTITION`, `AWS_REGION` (or `AWS_DEFAULT_REGION`) and `AWS_ACCOUNT_ID`.
    pub fn from_env() -> ResourceResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ResolveContext::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> ResourceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut context = match lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            Some(region) => Self::new(region),
            None => Self::default(),
        };
        if let Some(partition) = lookup("AWS_PARTITION") {
            context.partition = Partition::from_str(&partition)
                .ok_or_else(|| ResourceError::InvalidContext(format!("unknown partition '{}'", partition)))?;
        }
        context.account_id = lookup("AWS_ACCOUNT_ID");
        context.validate()?;
        Ok(context)
    }

    /// Check region and account id formats.
    pub fn validate(&self) -> ResourceResult<()> {
        let region = Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$")
            .map_err(|e| ResourceError::InvalidContext(e.to_string()))?;
        if !region.is_match(&self.region) {
            return Err(ResourceError::InvalidContext(format!("invalid region '{}'", self.region)));
        }
        if let Some(account) = &self.account_id {
            if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
                return Err(ResourceError::InvalidContext(format!(
                    "account id must be 12 digits, got '{}'",
                    account
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let context = ResolveContext::default();
        assert_eq!(context.partition, Partition::Aws);
        assert_eq!(context.region, "us-east-1");
        assert!(context.account_id.is_none());
    }

    #[test]
    fn test_partition_from_region() {
        assert_eq!(ResolveContext::new("cn-north-1").partition, Partition::AwsCn);
        assert_eq!(ResolveContext::new("us-gov-west-1").partition, Partition::AwsUsGov);
        assert_eq!(ResolveContext::new("eu-west-1").partition, Partition::Aws);
    }

    #[test]
    fn test_from_yaml() {
        let context = ResolveContext::from_yaml_str("region: eu-central-1\naccount_id: \"123456789012\"\n").unwrap();
        assert_eq!(context.region, "eu-central-1");
        assert_eq!(context.partition, Partition::Aws);
        assert_eq!(context.account_id.as_deref(), Some("123456789012"));

        let context = ResolveContext::from_yaml_str("partition: aws-cn\nregion: cn-north-1\n").unwrap();
        assert_eq!(context.partition, Partition::AwsCn);

        assert_eq!(ResolveContext::from_yaml_str("{}").unwrap(), ResolveContext::default());

        assert!(ResolveContext::from_yaml_str("account_id: \"12\"\n").is_err());
    }

    #[test]
    fn test_yaml_partition_follows_region() {
        let context = ResolveContext::from_yaml_str("region: cn-north-1\naccount_id: \"123456789012\"\n").unwrap();
        assert_eq!(context.partition, Partition::AwsCn);

        let context = ResolveContext::from_yaml_str("region: us-gov-west-1\n").unwrap();
        assert_eq!(context.partition, Partition::AwsUsGov);

        let context = ResolveContext::from_yaml_str("partition: aws\nregion: cn-north-1\n").unwrap();
        assert_eq!(context.partition, Partition::Aws);
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [("AWS_DEFAULT_REGION", "ap-southeast-2"), ("AWS_ACCOUNT_ID", "210987654321")]
            .into_iter()
            .collect();
        let context = ResolveContext::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(context.region, "ap-southeast-2");
        assert_eq!(context.account_id.as_deref(), Some("210987654321"));

        let err = ResolveContext::from_lookup(|key| (key == "AWS_PARTITION").then(|| "azure".to_string()));
        assert!(matches!(err, Err(ResourceError::InvalidContext(_))));
    }
}
