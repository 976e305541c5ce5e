//! Built-in custom constraint stages and the named library documents refer to.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use crate::constraint::CustomConstraint;
use crate::error::{SchemaError, SchemaResult};

/// IPv4 address; surrounding whitespace is trimmed.
pub fn ipv4() -> CustomConstraint {
    CustomConstraint::transform("ipv4", |value| {
        let text = value.as_str().unwrap_or_default().trim();
        text.parse::<Ipv4Addr>()
            .map(|addr| Value::String(addr.to_string()))
            .map_err(|_| format!("{:?} is not a valid IPv4 address", text))
    })
}

/// IPv4 or IPv6 CIDR block with a prefix length valid for its family.
pub fn cidr() -> CustomConstraint {
    CustomConstraint::transform("cidr", |value| {
        let text = value.as_str().unwrap_or_default().trim();
        let (addr, prefix) = text
            .split_once('/')
            .ok_or_else(|| format!("{:?} is missing a prefix length", text))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| format!("{:?} is not a valid network address", addr))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|_| format!("{:?} is not a valid prefix length", prefix))?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(format!("prefix length {} exceeds {}", prefix, max));
        }
        Ok(Value::String(format!("{}/{}", addr, prefix)))
    })
}

/// Lower-cases a string.
pub fn lowercase() -> CustomConstraint {
    CustomConstraint::transform("lowercase", |value| {
        Ok(Value::String(value.as_str().unwrap_or_default().to_lowercase()))
    })
}

/// Rejects blank strings.
pub fn non_empty() -> CustomConstraint {
    CustomConstraint::predicate("non_empty", "must not be blank", |value| {
        value.as_str().is_some_and(|s| !s.trim().is_empty())
    })
}

/// Standard base64; the value is decoded to check it and kept encoded.
pub fn base64() -> CustomConstraint {
    CustomConstraint::transform("base64", |value| {
        let text = value.as_str().unwrap_or_default();
        STANDARD
            .decode(text)
            .map(|_| value.clone())
            .map_err(|e| format!("is not valid base64 ({})", e))
    })
}

/// A JSON document encoded as a string (e.g. an IAM policy).
pub fn json_document() -> CustomConstraint {
    CustomConstraint::transform("json_document", |value| {
        let text = value.as_str().unwrap_or_default();
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(_)) => Ok(value.clone()),
            Ok(_) => Err("must be a JSON object".to_string()),
            Err(e) => Err(format!("is not valid JSON ({})", e)),
        }
    })
}

/// Reserved autonomous system numbers (RFC 7300, RFC 5398, RFC 6793).
const RESERVED_ASNS: &[(u64, u64)] = &[
    (0, 0),
    (23456, 23456),
    (64496, 64511),
    (65535, 65535),
    (65536, 65551),
    (4294967295, 4294967295),
];

/// A BGP autonomous system number that is not reserved.
pub fn asn() -> CustomConstraint {
    CustomConstraint::transform("asn", |value| {
        let asn = value
            .as_u64()
            .ok_or_else(|| "must be a non-negative integer".to_string())?;
        if asn > u32::MAX as u64 {
            return Err(format!("{} exceeds the 32-bit ASN space", asn));
        }
        if RESERVED_ASNS.iter().any(|(lo, hi)| (*lo..=*hi).contains(&asn)) {
            return Err(format!("{} is a reserved ASN", asn));
        }
        Ok(value.clone())
    })
}

/// Named custom stages available to schema documents.
#[derive(Debug, Clone, Default)]
pub struct CustomLibrary {
    constraints: BTreeMap<String, CustomConstraint>,
}

impl CustomLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding every built-in stage.
    pub fn builtin() -> Self {
        let mut library = Self::new();
        for constraint in [ipv4(), cidr(), lowercase(), non_empty(), base64(), json_document(), asn()] {
            library.add(constraint);
        }
        library
    }

    /// Add a stage under its own name, replacing any previous one.
    pub fn add(&mut self, constraint: CustomConstraint) {
        self.constraints.insert(constraint.name().to_string(), constraint);
    }

    pub fn with(mut self, constraint: CustomConstraint) -> Self {
        self.add(constraint);
        self
    }

    pub fn get(&self, name: &str) -> Option<&CustomConstraint> {
        self.constraints.get(name)
    }

    pub fn get_required(&self, name: &str) -> SchemaResult<CustomConstraint> {
        self.get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownCustom(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.constraints.keys().map(|s| s.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::CustomContext;
    use crate::path::FieldPath;
    use serde_json::{json, Map};

    fn run(constraint: &CustomConstraint, value: Value) -> Result<Value, String> {
        let path = FieldPath::root();
        let record = Map::new();
        constraint.apply(&value, &CustomContext::new(&path, &record))
    }

    #[test]
    fn test_ipv4_normalizes_and_is_idempotent() {
        let once = run(&ipv4(), json!(" 10.0.0.1 ")).unwrap();
        assert_eq!(once, json!("10.0.0.1"));
        assert_eq!(run(&ipv4(), once.clone()).unwrap(), once);
        assert!(run(&ipv4(), json!("10.0.0.256")).is_err());
    }

    #[test]
    fn test_cidr() {
        assert_eq!(run(&cidr(), json!("10.0.0.0/16")).unwrap(), json!("10.0.0.0/16"));
        assert!(run(&cidr(), json!("2001:db8::/32")).is_ok());
        assert!(run(&cidr(), json!("10.0.0.0/33")).is_err());
        assert!(run(&cidr(), json!("10.0.0.0")).is_err());
    }

    #[test]
    fn test_lowercase_is_idempotent() {
        let once = run(&lowercase(), json!("TCP")).unwrap();
        assert_eq!(run(&lowercase(), once.clone()).unwrap(), once);
    }

    #[test]
    fn test_base64() {
        assert!(run(&base64(), json!("aGVsbG8=")).is_ok());
        assert!(run(&base64(), json!("not base64!")).is_err());
    }

    #[test]
    fn test_reserved_asns_rejected() {
        assert!(run(&asn(), json!(65000)).is_ok());
        assert!(run(&asn(), json!(64512)).is_ok());
        for reserved in [0, 23456, 64500, 65535, 65540, 4294967295u64] {
            assert!(run(&asn(), json!(reserved)).is_err(), "{} should be reserved", reserved);
        }
    }

    #[test]
    fn test_json_document() {
        assert!(run(&json_document(), json!(r#"{"Version":"2012-10-17"}"#)).is_ok());
        assert!(run(&json_document(), json!("[1]")).is_err());
        assert!(run(&json_document(), json!("{")).is_err());
    }

    #[test]
    fn test_library_lookup() {
        let library = CustomLibrary::builtin();
        assert!(library.get("cidr").is_some());
        assert!(matches!(library.get_required("nope"), Err(SchemaError::UnknownCustom(_))));
    }
}
