//! # Policy
//!
//! The root entity. A policy holds rule groups plus shared top-level
//! properties (compact notation) that rules inherit during normalization.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::rule::{Action, Duty, Permission, Prohibition};
use crate::vocab::local_name;

// ---------------------------------------------------------------------------
// PolicyType
// ---------------------------------------------------------------------------

/// ODRL policy subclass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PolicyType {
    /// A set of rules with no parties required (the default).
    #[default]
    Set,
    /// Rules proposed by an assigner.
    Offer,
    /// Rules agreed between assigner and assignee.
    Agreement,
    /// Any other type tag. ODRL is extensible, so it passes through.
    Other(String),
}

impl PolicyType {
    /// The type term.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Set => "Set",
            Self::Offer => "Offer",
            Self::Agreement => "Agreement",
            Self::Other(tag) => tag,
        }
    }

    /// Whether this is one of the ODRL core subclasses.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for PolicyType {
    fn from(tag: &str) -> Self {
        match local_name(tag) {
            "Set" => Self::Set,
            "Offer" => Self::Offer,
            "Agreement" => Self::Agreement,
            _ => Self::Other(tag.to_string()),
        }
    }
}

impl From<String> for PolicyType {
    fn from(tag: String) -> Self {
        Self::from(tag.as_str())
    }
}

impl From<PolicyType> for String {
    fn from(t: PolicyType) -> Self {
        match t {
            PolicyType::Other(tag) => tag,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ConflictStrategy
// ---------------------------------------------------------------------------

/// How to decide when a permission and a prohibition both apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConflictStrategy {
    /// Permissions override prohibitions.
    Perm,
    /// Prohibitions override permissions.
    Prohibit,
    /// A conflict leaves the request undetermined (the default).
    #[default]
    Invalid,
    /// An unrecognized strategy. Treated like `Invalid` at decision time.
    Unresolved(String),
}

impl ConflictStrategy {
    /// The strategy term.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Perm => "perm",
            Self::Prohibit => "prohibit",
            Self::Invalid => "invalid",
            Self::Unresolved(s) => s,
        }
    }

    /// Whether this is one of the ODRL strategies.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unresolved(_))
    }
}

impl From<&str> for ConflictStrategy {
    fn from(term: &str) -> Self {
        match local_name(term) {
            "perm" => Self::Perm,
            "prohibit" => Self::Prohibit,
            "invalid" => Self::Invalid,
            _ => Self::Unresolved(term.to_string()),
        }
    }
}

impl From<String> for ConflictStrategy {
    fn from(term: String) -> Self {
        Self::from(term.as_str())
    }
}

impl From<ConflictStrategy> for String {
    fn from(s: ConflictStrategy) -> Self {
        match s {
            ConflictStrategy::Unresolved(term) => term,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// An ODRL policy as written, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Policy IRI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Policy subclass.
    #[serde(default)]
    pub policy_type: PolicyType,
    /// Conflict resolution strategy.
    #[serde(default)]
    pub conflict: ConflictStrategy,
    /// JSON-LD `@context`, carried verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    /// Profiles the policy conforms to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub profile: Vec<String>,
    /// Parent policies. Carried, not resolved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherit_from: Vec<String>,
    /// Shared assigner (compact notation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigner: Option<Vec<String>>,
    /// Shared assignee (compact notation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Vec<String>>,
    /// Shared target (compact notation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec<String>>,
    /// Shared action (compact notation).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action: Vec<Action>,
    /// Permissions in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permission: Vec<Permission>,
    /// Prohibitions in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prohibition: Vec<Prohibition>,
    /// Obligations in declared order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub obligation: Vec<Duty>,
    /// Properties outside the core vocabulary, carried verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, Value>,
}

impl Policy {
    /// An empty policy of the given type.
    pub fn new(policy_type: PolicyType) -> Self {
        Self {
            policy_type,
            ..Self::default()
        }
    }

    /// Builder: set the identifier.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Builder: set the conflict strategy.
    pub fn with_conflict(mut self, conflict: ConflictStrategy) -> Self {
        self.conflict = conflict;
        self
    }

    /// Builder: set the shared assigner.
    pub fn with_assigner(mut self, party: impl Into<String>) -> Self {
        self.assigner.get_or_insert_with(Vec::new).push(party.into());
        self
    }

    /// Builder: set the shared assignee.
    pub fn with_assignee(mut self, party: impl Into<String>) -> Self {
        self.assignee.get_or_insert_with(Vec::new).push(party.into());
        self
    }

    /// Builder: set the shared target.
    pub fn with_target(mut self, asset: impl Into<String>) -> Self {
        self.target.get_or_insert_with(Vec::new).push(asset.into());
        self
    }

    /// Builder: add a shared action.
    pub fn with_action(mut self, action: impl Into<Action>) -> Self {
        self.action.push(action.into());
        self
    }

    /// Builder: add a permission.
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permission.push(permission);
        self
    }

    /// Builder: add a prohibition.
    pub fn with_prohibition(mut self, prohibition: Prohibition) -> Self {
        self.prohibition.push(prohibition);
        self
    }

    /// Builder: add an obligation.
    pub fn with_obligation(mut self, duty: Duty) -> Self {
        self.obligation.push(duty);
        self
    }

    /// Total number of top-level rules.
    pub fn rule_count(&self) -> usize {
        self.permission.len() + self.prohibition.len() + self.obligation.len()
    }
}
