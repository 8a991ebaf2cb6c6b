//! # Verdict
//!
//! The decision engine's output: a decision, whether a permission and a
//! prohibition collided, and the duties the request triggers.

use std::fmt;

use serde::{Deserialize, Serialize};

use odrl_core::Action;
use odrl_policy::RuleIndex;

/// Outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The request may proceed.
    Permitted,
    /// The request may not proceed.
    Denied,
    /// No definite answer: an unresolved conflict, pending preconditions,
    /// or missing data that could change the answer.
    Undetermined,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permitted => f.write_str("permitted"),
            Self::Denied => f.write_str("denied"),
            Self::Undetermined => f.write_str("undetermined"),
        }
    }
}

/// Why a duty was surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyOrigin {
    /// Remedy of a matched prohibition.
    Remedy,
    /// Unfulfilled precondition of a matched permission.
    Precondition,
    /// Top-level obligation on the requesting party.
    Obligation,
    /// Consequence of an unfulfilled duty.
    Consequence,
}

/// Key a duty is tracked under in a ledger: its `uid`, or a key scoped by
/// the policy's identity and content digest when it has none.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DutyKey(String);

impl DutyKey {
    /// Wrap a key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DutyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DutyKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// A duty the request triggers, with its fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredDuty {
    /// Ledger key.
    pub key: DutyKey,
    /// The duty's rule in the arena.
    pub rule: RuleIndex,
    /// Why it was surfaced.
    pub origin: DutyOrigin,
    /// The rule that declared it: the prohibition, permission or parent
    /// duty. For top-level obligations, the duty itself.
    pub source_rule: RuleIndex,
    /// What must be done.
    pub actions: Vec<Action>,
    /// Resolved target.
    pub target: Option<Vec<String>>,
    /// Resolved assignee (who must perform it).
    pub assignee: Option<Vec<String>>,
    /// Duties that apply if this one is not fulfilled.
    pub consequences: Vec<TriggeredDuty>,
}

impl TriggeredDuty {
    /// Name of the first action.
    pub fn action_name(&self) -> &str {
        self.actions.first().map(Action::local_name).unwrap_or_default()
    }
}

/// Result of [`DecisionEngine::decide`](crate::DecisionEngine::decide).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// The decision.
    pub decision: Decision,
    /// A permission and a prohibition both applied. Under `invalid` or an
    /// unrecognized strategy this is what made the decision undetermined.
    pub conflict: bool,
    /// Triggered duties: remedies, then unmet preconditions, then
    /// policy obligations.
    pub obligations: Vec<TriggeredDuty>,
    /// Permissions whose scope and constraints matched.
    pub matched_permissions: Vec<RuleIndex>,
    /// Prohibitions whose scope and constraints matched.
    pub matched_prohibitions: Vec<RuleIndex>,
}

impl Verdict {
    /// Whether the request may proceed.
    pub fn is_permitted(&self) -> bool {
        self.decision == Decision::Permitted
    }

    /// Action names of the triggered duties, in order.
    pub fn obligation_actions(&self) -> Vec<&str> {
        self.obligations.iter().map(TriggeredDuty::action_name).collect()
    }
}
