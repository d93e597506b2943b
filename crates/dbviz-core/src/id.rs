//! Producer-scoped identifier newtypes.
//!
//! Each producer allocates ids from counters that live inside its own state,
//! so two sessions never share a sequence. On the wire every id is a prefixed
//! string (`node-3`, `tx-1`, `ver-7`, `ast-2`) so the renderer can use it as a
//! DOM key directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

macro_rules! prefixed_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub u32);

        impl $name {
            /// The wire prefix preceding the numeric part.
            pub const PREFIX: &'static str = $prefix;
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.strip_prefix($prefix)
                    .and_then(|rest| rest.strip_prefix('-'))
                    .and_then(|n| n.parse::<u32>().ok())
                    .map($name)
                    .ok_or_else(|| CoreError::InvalidId {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_string()
            }
        }
    };
}

prefixed_id!(
    /// B-Tree node identifier.
    NodeId,
    "node",
    "node"
);

prefixed_id!(
    /// MVCC transaction identifier.
    TxId,
    "tx",
    "transaction"
);

prefixed_id!(
    /// MVCC row version identifier.
    VersionId,
    "ver",
    "version"
);

prefixed_id!(
    /// Parser AST node identifier.
    AstNodeId,
    "ast",
    "ast node"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefix() {
        assert_eq!(NodeId(3).to_string(), "node-3");
        assert_eq!(TxId(1).to_string(), "tx-1");
        assert_eq!(VersionId(12).to_string(), "ver-12");
        assert_eq!(AstNodeId(0).to_string(), "ast-0");
    }

    #[test]
    fn parse_accepts_own_prefix_only() {
        assert_eq!("tx-4".parse::<TxId>().unwrap(), TxId(4));
        assert!("ver-4".parse::<TxId>().is_err());
        assert!("tx4".parse::<TxId>().is_err());
        assert!("tx-".parse::<TxId>().is_err());
    }

    #[test]
    fn parse_error_names_kind() {
        let err = "bogus".parse::<VersionId>().unwrap_err();
        assert_eq!(err.to_string(), "invalid version id: 'bogus'");
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&NodeId(9)).unwrap();
        assert_eq!(json, "\"node-9\"");
        let back: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, NodeId(9));
    }

    #[test]
    fn ordering_is_numeric() {
        assert!(TxId(9) < TxId(10));
        assert!(TxId(9).to_string() > TxId(10).to_string());
    }

    #[test]
    fn ids_work_as_json_map_keys() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(NodeId(2), 20);
        map.insert(NodeId(1), 10);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"node-1":10,"node-2":20}"#);
    }
}
