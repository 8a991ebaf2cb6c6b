//! # Rules and Actions
//!
//! Permission, Prohibition and Duty share the attributes in [`Rule`] and
//! differ in the fallback duties they declare:
//!
//! - a Permission's `duty` entries are preconditions,
//! - a Prohibition's `remedy` entries apply if it is infringed,
//! - a Duty's `consequence` entries apply if it is not fulfilled.
//!
//! Fallback duties may declare consequences of their own. The result is a
//! tree owned by the declaring rule; its depth is bounded at normalization.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constraint::Constraint;
use crate::vocab::local_name;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// An operation on an asset, optionally narrowed by refinements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Action {
    /// Bare action name.
    Name(String),
    /// Action narrowed by refinement constraints.
    Refined {
        /// Action name.
        name: String,
        /// Constraints that must hold for the action to be in scope.
        refinement: Vec<Constraint>,
    },
}

impl Action {
    /// Refined action.
    pub fn refined(name: impl Into<String>, refinement: Vec<Constraint>) -> Self {
        Self::Refined {
            name: name.into(),
            refinement,
        }
    }

    /// The action name as written.
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Refined { name, .. } => name,
        }
    }

    /// The action name with the ODRL namespace stripped.
    pub fn local_name(&self) -> &str {
        local_name(self.name())
    }

    /// Refinement constraints (empty for a bare action).
    pub fn refinements(&self) -> &[Constraint] {
        match self {
            Self::Name(_) => &[],
            Self::Refined { refinement, .. } => refinement,
        }
    }
}

impl From<&str> for Action {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// Attributes shared by every rule kind.
///
/// `None` for a party or target means "not declared here"; normalization
/// fills it from the enclosing rule or policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Optional identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Issuing parties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigner: Option<Vec<String>>,
    /// Recipient parties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<Vec<String>>,
    /// Target assets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Vec<String>>,
    /// Actions; empty means "inherit".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub action: Vec<Action>,
    /// Constraints, all of which must hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraint: Vec<Constraint>,
    /// Properties outside the core vocabulary, carried verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, Value>,
}

impl Rule {
    /// A rule over a single action.
    pub fn new(action: impl Into<Action>) -> Self {
        Self {
            action: vec![action.into()],
            ..Self::default()
        }
    }

    /// Builder: set the identifier.
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Builder: add an assigner.
    pub fn with_assigner(mut self, party: impl Into<String>) -> Self {
        self.assigner.get_or_insert_with(Vec::new).push(party.into());
        self
    }

    /// Builder: add an assignee.
    pub fn with_assignee(mut self, party: impl Into<String>) -> Self {
        self.assignee.get_or_insert_with(Vec::new).push(party.into());
        self
    }

    /// Builder: add a target asset.
    pub fn with_target(mut self, asset: impl Into<String>) -> Self {
        self.target.get_or_insert_with(Vec::new).push(asset.into());
        self
    }

    /// Builder: add an action.
    pub fn with_action(mut self, action: impl Into<Action>) -> Self {
        self.action.push(action.into());
        self
    }

    /// Builder: add a constraint.
    pub fn with_constraint(mut self, constraint: impl Into<Constraint>) -> Self {
        self.constraint.push(constraint.into());
        self
    }
}

/// Ability to exercise an action, subject to precondition duties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    /// Shared rule attributes.
    #[serde(flatten)]
    pub rule: Rule,
    /// Preconditions that must be fulfilled before the permission grants.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duty: Vec<Duty>,
}

/// Inability to exercise an action, with remedies if infringed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prohibition {
    /// Shared rule attributes.
    #[serde(flatten)]
    pub rule: Rule,
    /// Duties that apply if the prohibition is infringed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remedy: Vec<Duty>,
}

/// Obligation to exercise an action, with consequences if unfulfilled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Duty {
    /// Shared rule attributes.
    #[serde(flatten)]
    pub rule: Rule,
    /// Duties that apply if this duty is not fulfilled.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consequence: Vec<Duty>,
}

impl Permission {
    /// Wrap rule attributes as a permission.
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            duty: Vec::new(),
        }
    }

    /// Builder: add a precondition duty.
    pub fn with_duty(mut self, duty: Duty) -> Self {
        self.duty.push(duty);
        self
    }
}

impl Prohibition {
    /// Wrap rule attributes as a prohibition.
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            remedy: Vec::new(),
        }
    }

    /// Builder: add a remedy.
    pub fn with_remedy(mut self, remedy: Duty) -> Self {
        self.remedy.push(remedy);
        self
    }
}

impl Duty {
    /// Wrap rule attributes as a duty.
    pub fn new(rule: Rule) -> Self {
        Self {
            rule,
            consequence: Vec::new(),
        }
    }

    /// Builder: add a consequence.
    pub fn with_consequence(mut self, consequence: Duty) -> Self {
        self.consequence.push(consequence);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::Operator;

    #[test]
    fn action_accessors() {
        let bare = Action::from("odrl:print");
        assert_eq!(bare.name(), "odrl:print");
        assert_eq!(bare.local_name(), "print");
        assert!(bare.refinements().is_empty());

        let refined = Action::refined(
            "print",
            vec![Constraint::atomic("resolution", Operator::Lteq, 1200)],
        );
        assert_eq!(refined.refinements().len(), 1);
    }

    #[test]
    fn rule_builders_accumulate() {
        let rule = Rule::new("use")
            .with_target("urn:asset:1")
            .with_target("urn:asset:2")
            .with_assignee("urn:party:a")
            .with_uid("urn:rule:1");
        assert_eq!(rule.target.as_deref().map(<[String]>::len), Some(2));
        assert_eq!(rule.assignee, Some(vec!["urn:party:a".to_string()]));
        assert_eq!(rule.assigner, None);
    }

    #[test]
    fn permission_serializes_flat() {
        let p = Permission::new(Rule::new("use").with_target("t"))
            .with_duty(Duty::new(Rule::new("compensate")));
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["target"][0], "t");
        assert_eq!(json["duty"][0]["action"][0], "compensate");
        let back: Permission = serde_json::from_value(json).unwrap();
        assert_eq!(back, p);
    }
}
