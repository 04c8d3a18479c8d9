//! # Core Domain Entities
//!
//! Ledger entities shared between the ledger engine, the confirmation
//! protocol and peer synchronization.
//!
//! ## Clusters
//!
//! - **Tags**: `Type` (closed variant enumeration), `NodeRole`
//! - **State**: `AccountState`, `Schedule`
//! - **Networking**: `Node`, `NodeDeclaration`

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

use crate::ids::{AccountLock, AccountNumber};

// =============================================================================
// CLUSTER A: TAGS
// =============================================================================

/// Closed enumeration of request/block variants.
///
/// Serialized as its integer value. Adding a variant means adding a value
/// here and an arm to every dispatch `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Type {
    Genesis = 0,
    NodeDeclaration = 1,
}

impl Type {
    /// All known variants in tag order.
    pub const ALL: [Type; 2] = [Type::Genesis, Type::NodeDeclaration];

    /// Upper-case tag name.
    pub fn name(&self) -> &'static str {
        match self {
            Type::Genesis => "GENESIS",
            Type::NodeDeclaration => "NODE_DECLARATION",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u64> for Type {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Type::Genesis),
            1 => Ok(Type::NodeDeclaration),
            other => Err(other),
        }
    }
}

impl Serialize for Type {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for Type {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u64::deserialize(deserializer)?;
        Type::try_from(value).map_err(|v| de::Error::custom(format!("unknown type tag {v}")))
    }
}

/// Role a node plays for the next block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    PrimaryValidator,
    ConfirmationValidator,
    RegularNode,
}

// =============================================================================
// CLUSTER B: NETWORKING
// =============================================================================

/// A peer's declared identity and reachable endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier (the account number that declared it).
    pub identifier: AccountNumber,
    /// Base URLs in preference order, each ending with `/`.
    pub addresses: Vec<String>,
    /// Fee charged by the node.
    pub fee: u64,
}

impl Node {
    /// Build a registry node from a declaration signed by `identifier`.
    pub fn from_declaration(identifier: AccountNumber, declaration: NodeDeclaration) -> Self {
        Self {
            identifier,
            addresses: declaration.addresses,
            fee: declaration.fee,
        }
    }

    /// Strip the identifier for embedding in a request message.
    pub fn to_declaration(&self) -> NodeDeclaration {
        NodeDeclaration {
            addresses: self.addresses.clone(),
            fee: self.fee,
        }
    }
}

/// Node payload of a declaration request.
///
/// Carries no identifier: the request signer is the node identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDeclaration {
    pub addresses: Vec<String>,
    pub fee: u64,
}

// =============================================================================
// CLUSTER C: STATE
// =============================================================================

/// Per-account projection written by block updates.
///
/// Only the fields present in an update are written. When reading the
/// ledger, an absent balance is 0 and an absent lock is the account number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_lock: Option<AccountLock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
}

impl AccountState {
    /// Overwrite every field carried by `update`.
    pub fn apply(&mut self, update: &AccountState) {
        if let Some(balance) = update.balance {
            self.balance = Some(balance);
        }
        if let Some(lock) = &update.account_lock {
            self.account_lock = Some(lock.clone());
        }
        if let Some(node) = &update.node {
            self.node = Some(node.clone());
        }
    }
}

/// Validator rotation: block number -> node authorized to produce it.
pub type Schedule = BTreeMap<u64, AccountNumber>;

#[cfg(test)]
mod tests {
    use super::*;

    fn account(byte: u8) -> AccountNumber {
        AccountNumber::from_bytes(&[byte; 32])
    }

    #[test]
    fn test_type_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Type::NodeDeclaration).unwrap(), "1");
        assert_eq!(serde_json::from_str::<Type>("0").unwrap(), Type::Genesis);
        assert!(serde_json::from_str::<Type>("9").is_err());
    }

    #[test]
    fn test_account_state_omits_absent_fields() {
        let state = AccountState {
            balance: Some(5),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&state).unwrap(), r#"{"balance":5}"#);
    }

    #[test]
    fn test_apply_replaces_carried_fields_only() {
        let node = Node {
            identifier: account(1),
            addresses: vec!["http://a/".into()],
            fee: 4,
        };
        let mut state = AccountState {
            balance: Some(100),
            account_lock: Some(account(1).into()),
            node: None,
        };
        state.apply(&AccountState {
            balance: None,
            account_lock: Some(account(2).into()),
            node: Some(node.clone()),
        });

        assert_eq!(state.balance, Some(100));
        assert_eq!(state.account_lock, Some(account(2).into()));
        assert_eq!(state.node, Some(node));
    }

    #[test]
    fn test_declaration_has_no_identifier() {
        let node = Node {
            identifier: account(3),
            addresses: vec!["http://a/".into()],
            fee: 1,
        };
        let json = serde_json::to_value(node.to_declaration()).unwrap();
        assert!(json.get("identifier").is_none());
        assert_eq!(Node::from_declaration(account(3), node.to_declaration()), node);
    }

    #[test]
    fn test_schedule_keys_serialize_as_strings() {
        let mut schedule = Schedule::new();
        schedule.insert(0, account(9));
        let json = serde_json::to_string(&schedule).unwrap();
        assert!(json.starts_with(r#"{"0":"#));
        let parsed: Schedule = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, schedule);
    }
}
