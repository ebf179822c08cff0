//! LAG and port identifiers and group records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::LagError;

/// Maximum identifier length in bytes.
pub const MAX_ID_LEN: usize = 64;

/// Prefix of server-assigned LAG identifiers.
pub const AUTO_LAG_PREFIX: &str = "PortChannel";

fn validate_id(kind: &str, value: &str) -> Result<(), LagError> {
    if value.is_empty() {
        return Err(LagError::invalid_argument(format!("{} must not be empty", kind)));
    }
    if value.len() > MAX_ID_LEN {
        return Err(LagError::invalid_argument(format!(
            "{} '{}' exceeds {} characters",
            kind, value, MAX_ID_LEN
        )));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '/' | '-')))
    {
        return Err(LagError::invalid_argument(format!(
            "{} '{}' contains invalid character {:?}",
            kind, value, c
        )));
    }
    Ok(())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = LagError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                validate_id($kind, s)?;
                Ok(Self(s.to_string()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = LagError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                validate_id($kind, &value)?;
                Ok(Self(value))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier of a LAG group, e.g. `PortChannel0001`.
    LagId,
    "LAG id"
);

identifier!(
    /// Identifier of a physical port, e.g. `Ethernet0`.
    PortId,
    "port id"
);

impl LagId {
    /// Builds the server-assigned identifier for `index`.
    pub fn auto(index: u32) -> Self {
        Self(format!("{}{:04}", AUTO_LAG_PREFIX, index))
    }
}

/// A link-aggregation group and its member ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagGroup {
    /// Group identifier (immutable).
    pub id: LagId,
    /// Member ports.
    pub members: BTreeSet<PortId>,
    /// When the group was created.
    pub created_at: DateTime<Utc>,
}

impl LagGroup {
    /// Creates an empty group stamped with the current time.
    pub fn new(id: LagId) -> Self {
        Self {
            id,
            members: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns true if the port is a member.
    pub fn has_member(&self, port: &PortId) -> bool {
        self.members.contains(port)
    }

    /// Returns the number of members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Returns an owned view of the group.
    pub fn info(&self) -> LagInfo {
        LagInfo {
            id: self.id.clone(),
            members: self.members.iter().cloned().collect(),
            created_at: self.created_at,
        }
    }
}

/// Owned snapshot of a group returned by queries. Members are sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagInfo {
    pub id: LagId,
    pub members: Vec<PortId>,
    pub created_at: DateTime<Utc>,
}

/// Parses a list of raw port names, rejecting empty lists and duplicates.
pub fn parse_members(raw: &[String]) -> Result<Vec<PortId>, LagError> {
    if raw.is_empty() {
        return Err(LagError::invalid_argument("member list must not be empty"));
    }
    parse_optional_members(raw)
}

/// Parses a possibly empty list of raw port names, rejecting duplicates.
pub fn parse_optional_members(raw: &[String]) -> Result<Vec<PortId>, LagError> {
    let mut seen = BTreeSet::new();
    let mut ports = Vec::with_capacity(raw.len());
    for name in raw {
        let port: PortId = name.parse()?;
        if !seen.insert(port.clone()) {
            return Err(LagError::invalid_argument(format!(
                "port '{}' listed more than once",
                port
            )));
        }
        ports.push(port);
    }
    Ok(ports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_valid_identifiers() {
        for id in ["PortChannel0001", "Ethernet0", "eth1/1", "Po-10.100", "x:y_z"] {
            assert!(id.parse::<LagId>().is_ok(), "{}", id);
            assert!(id.parse::<PortId>().is_ok(), "{}", id);
        }
    }

    #[test]
    fn test_invalid_identifiers() {
        let too_long = "a".repeat(MAX_ID_LEN + 1);
        for id in ["", "Port Channel", "lag#1", "über", too_long.as_str()] {
            let err = id.parse::<LagId>().unwrap_err();
            assert!(matches!(err, LagError::InvalidArgument { .. }), "{}", id);
        }
        assert!("a".repeat(MAX_ID_LEN).parse::<PortId>().is_ok());
    }

    #[test]
    fn test_auto_id_format() {
        assert_eq!(LagId::auto(1).as_str(), "PortChannel0001");
        assert_eq!(LagId::auto(42).as_str(), "PortChannel0042");
        assert_eq!(LagId::auto(12345).as_str(), "PortChannel12345");
    }

    #[test]
    fn test_serde_validates() {
        let id: PortId = serde_json::from_str("\"Ethernet4\"").unwrap();
        assert_eq!(id.as_str(), "Ethernet4");
        assert!(serde_json::from_str::<PortId>("\"bad id\"").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"Ethernet4\"");
    }

    #[test]
    fn test_parse_members() {
        let raw = vec!["Ethernet0".to_string(), "Ethernet4".to_string()];
        let ports = parse_members(&raw).unwrap();
        assert_eq!(ports.len(), 2);

        assert!(matches!(
            parse_members(&[]),
            Err(LagError::InvalidArgument { .. })
        ));
        assert!(parse_optional_members(&[]).unwrap().is_empty());

        let dup = vec!["Ethernet0".to_string(), "Ethernet0".to_string()];
        assert!(matches!(
            parse_members(&dup),
            Err(LagError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_group_info_sorted() {
        let mut group = LagGroup::new("PortChannel1".parse().unwrap());
        group.members.insert("Ethernet8".parse().unwrap());
        group.members.insert("Ethernet0".parse().unwrap());

        let info = group.info();
        let names: Vec<&str> = info.members.iter().map(|p| p.as_str()).collect();
        assert_eq!(names, vec!["Ethernet0", "Ethernet8"]);
        assert_eq!(info.created_at, group.created_at);
    }
}
