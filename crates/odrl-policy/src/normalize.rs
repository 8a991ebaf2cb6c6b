//! # Rule Normalization
//!
//! Resolves compact notation once, eagerly, and lays every rule out in an
//! index arena.
//!
//! ## Design
//!
//! - Each top-level rule takes each of assigner, assignee, target and
//!   action from itself, else from the policy, else leaves it absent.
//! - Each fallback duty (precondition, remedy, consequence) takes them
//!   from itself, else from its already-resolved parent rule.
//! - The rule tree is walked with an explicit FIFO work queue and a depth
//!   counter. Top-level rules are depth 0; a rule deeper than
//!   `max_fallback_depth` aborts normalization.
//! - The arena holds top-level rules first (permissions, prohibitions,
//!   obligations, each in declared order), then fallbacks breadth-first.
//!   Every rule lists its fallbacks in declared order.
//! - The policy carries a SHA-256 digest of its normalized content. Rules
//!   without a `uid` are keyed by policy identity, digest and arena
//!   position, so two policies (or two revisions of one policy) never
//!   share a generated duty key.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use odrl_core::{
    Action, ConflictStrategy, Constraint, Duty, EngineConfig, Permission, Policy, PolicyType,
    Prohibition, Rule, StructuralError,
};

// ---------------------------------------------------------------------------
// RuleIndex / RuleRole
// ---------------------------------------------------------------------------

/// Position of a rule in a [`NormalizedPolicy`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleIndex(usize);

impl RuleIndex {
    /// The raw arena position.
    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for RuleIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule:{}", self.0)
    }
}

/// Where a rule sits in the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleRole {
    /// Top-level permission.
    Permission,
    /// Top-level prohibition.
    Prohibition,
    /// Top-level obligation.
    Obligation,
    /// A permission's precondition duty.
    Precondition,
    /// A prohibition's remedy.
    Remedy,
    /// A duty's consequence.
    Consequence,
}

impl RuleRole {
    /// Role of this rule's fallback duties.
    pub fn fallback_role(self) -> Self {
        match self {
            Self::Permission => Self::Precondition,
            Self::Prohibition => Self::Remedy,
            Self::Obligation | Self::Precondition | Self::Remedy | Self::Consequence => {
                Self::Consequence
            }
        }
    }

    /// Document key holding fallbacks of this role.
    pub fn document_key(self) -> &'static str {
        match self {
            Self::Permission => "permission",
            Self::Prohibition => "prohibition",
            Self::Obligation => "obligation",
            Self::Precondition => "duty",
            Self::Remedy => "remedy",
            Self::Consequence => "consequence",
        }
    }

    /// Whether this is a fallback duty rather than a top-level rule.
    pub fn is_fallback(self) -> bool {
        matches!(self, Self::Precondition | Self::Remedy | Self::Consequence)
    }
}

impl fmt::Display for RuleRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.document_key())
    }
}

// ---------------------------------------------------------------------------
// NormalizedRule / NormalizedPolicy
// ---------------------------------------------------------------------------

/// A rule with every inheritable field resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRule {
    /// Arena position.
    pub index: RuleIndex,
    /// Where the rule sits.
    pub role: RuleRole,
    /// Identifier, if declared.
    pub uid: Option<String>,
    /// Document path, e.g. `permission[0].duty[1]`.
    pub path: String,
    /// Resolved assigner; `None` when declared nowhere.
    pub assigner: Option<Vec<String>>,
    /// Resolved assignee; `None` when declared nowhere.
    pub assignee: Option<Vec<String>>,
    /// Resolved target; `None` when declared nowhere.
    pub target: Option<Vec<String>>,
    /// Resolved actions.
    pub action: Vec<Action>,
    /// The rule's own constraints. Constraints are not inherited.
    pub constraint: Vec<Constraint>,
    /// Declaring rule, for fallbacks.
    pub parent: Option<RuleIndex>,
    /// 0 for top-level rules.
    pub depth: usize,
    /// Fallback duties in declared order.
    pub fallbacks: Vec<RuleIndex>,
    /// Non-core properties.
    pub extensions: BTreeMap<String, Value>,
}

impl NormalizedRule {
    fn to_rule(&self) -> Rule {
        Rule {
            uid: self.uid.clone(),
            assigner: self.assigner.clone(),
            assignee: self.assignee.clone(),
            target: self.target.clone(),
            action: self.action.clone(),
            constraint: self.constraint.clone(),
            extensions: self.extensions.clone(),
        }
    }
}

/// A policy whose rules are self-contained arena records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPolicy {
    /// Policy IRI.
    pub uid: Option<String>,
    /// Policy subclass.
    pub policy_type: PolicyType,
    /// Conflict strategy.
    pub conflict: ConflictStrategy,
    /// `@context`, verbatim.
    pub context: Option<Value>,
    /// Declared profiles.
    pub profile: Vec<String>,
    /// Parent policies, unresolved.
    pub inherit_from: Vec<String>,
    /// Policy-level shared fields as declared.
    pub shared: SharedFields,
    /// Non-core properties.
    pub extensions: BTreeMap<String, Value>,
    rules: Vec<NormalizedRule>,
    permissions: Vec<RuleIndex>,
    prohibitions: Vec<RuleIndex>,
    obligations: Vec<RuleIndex>,
    digest: String,
}

/// Compact-notation fields declared at policy level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharedFields {
    /// Shared assigner.
    pub assigner: Option<Vec<String>>,
    /// Shared assignee.
    pub assignee: Option<Vec<String>>,
    /// Shared target.
    pub target: Option<Vec<String>>,
    /// Shared actions.
    pub action: Vec<Action>,
}

impl NormalizedPolicy {
    /// Truncated hex SHA-256 of the normalized content.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Key under which duty state for `rule` is tracked.
    ///
    /// A declared `uid` is used as is. Otherwise the key is scoped by the
    /// policy `uid` (when present) and the content digest, then the arena
    /// position: `urn:policy:1@3f2a…#rule:4` or `sha256:3f2a…#rule:4`.
    pub fn rule_key(&self, rule: &NormalizedRule) -> String {
        match (&rule.uid, &self.uid) {
            (Some(uid), _) => uid.clone(),
            (None, Some(policy)) => format!("{policy}@{}#{}", self.digest, rule.index),
            (None, None) => format!("sha256:{}#{}", self.digest, rule.index),
        }
    }

    /// Every rule in arena order.
    pub fn rules(&self) -> &[NormalizedRule] {
        &self.rules
    }

    /// The rule at `index`.
    pub fn rule(&self, index: RuleIndex) -> Option<&NormalizedRule> {
        self.rules.get(index.0)
    }

    /// Top-level permissions in declared order.
    pub fn permissions(&self) -> impl Iterator<Item = &NormalizedRule> {
        self.group(&self.permissions)
    }

    /// Top-level prohibitions in declared order.
    pub fn prohibitions(&self) -> impl Iterator<Item = &NormalizedRule> {
        self.group(&self.prohibitions)
    }

    /// Top-level obligations in declared order.
    pub fn obligations(&self) -> impl Iterator<Item = &NormalizedRule> {
        self.group(&self.obligations)
    }

    /// Fallback duties of `rule`, in declared order.
    pub fn fallbacks<'a>(
        &'a self,
        rule: &'a NormalizedRule,
    ) -> impl Iterator<Item = &'a NormalizedRule> {
        self.group(&rule.fallbacks)
    }

    /// Every constraint in the policy: rule constraints and action
    /// refinements, top level only (composites are not flattened).
    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.rules.iter().flat_map(|r| {
            r.constraint
                .iter()
                .chain(r.action.iter().flat_map(|a| a.refinements().iter()))
        })
    }

    fn group<'a>(&'a self, indices: &'a [RuleIndex]) -> impl Iterator<Item = &'a NormalizedRule> {
        indices.iter().filter_map(move |i| self.rules.get(i.0))
    }

    /// Re-expand into a [`Policy`] with every rule carrying its resolved
    /// fields explicitly.
    pub fn to_policy(&self) -> Policy {
        // Children are rebuilt before parents: in breadth-first arena order
        // every fallback sits after its parent, so a reverse pass suffices.
        let mut built: Vec<Option<Duty>> = vec![None; self.rules.len()];
        for rule in self.rules.iter().rev().filter(|r| r.role.is_fallback()) {
            let duty = Duty {
                rule: rule.to_rule(),
                consequence: self.take_children(rule, &mut built),
            };
            built[rule.index.0] = Some(duty);
        }

        let mut policy = Policy {
            uid: self.uid.clone(),
            policy_type: self.policy_type.clone(),
            conflict: self.conflict.clone(),
            context: self.context.clone(),
            profile: self.profile.clone(),
            inherit_from: self.inherit_from.clone(),
            assigner: self.shared.assigner.clone(),
            assignee: self.shared.assignee.clone(),
            target: self.shared.target.clone(),
            action: self.shared.action.clone(),
            extensions: self.extensions.clone(),
            ..Policy::default()
        };
        for rule in self.permissions() {
            policy.permission.push(Permission {
                rule: rule.to_rule(),
                duty: self.take_children(rule, &mut built),
            });
        }
        for rule in self.prohibitions() {
            policy.prohibition.push(Prohibition {
                rule: rule.to_rule(),
                remedy: self.take_children(rule, &mut built),
            });
        }
        for rule in self.obligations() {
            policy.obligation.push(Duty {
                rule: rule.to_rule(),
                consequence: self.take_children(rule, &mut built),
            });
        }
        policy
    }

    fn take_children(&self, rule: &NormalizedRule, built: &mut [Option<Duty>]) -> Vec<Duty> {
        rule.fallbacks
            .iter()
            .filter_map(|i| built.get_mut(i.0).and_then(Option::take))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

/// One pending rule in the normalization queue.
struct Work<'p> {
    rule: &'p Rule,
    fallbacks: &'p [Duty],
    role: RuleRole,
    parent: Option<RuleIndex>,
    depth: usize,
    path: String,
}

/// Resolve compact notation and build the rule arena.
pub fn normalize(
    policy: &Policy,
    config: &EngineConfig,
) -> Result<NormalizedPolicy, StructuralError> {
    let mut queue: VecDeque<Work<'_>> = VecDeque::new();
    for (i, p) in policy.permission.iter().enumerate() {
        queue.push_back(top_level(&p.rule, &p.duty, RuleRole::Permission, i));
    }
    for (i, p) in policy.prohibition.iter().enumerate() {
        queue.push_back(top_level(&p.rule, &p.remedy, RuleRole::Prohibition, i));
    }
    for (i, d) in policy.obligation.iter().enumerate() {
        queue.push_back(top_level(&d.rule, &d.consequence, RuleRole::Obligation, i));
    }

    let mut out = NormalizedPolicy {
        uid: policy.uid.clone(),
        policy_type: policy.policy_type.clone(),
        conflict: policy.conflict.clone(),
        context: policy.context.clone(),
        profile: policy.profile.clone(),
        inherit_from: policy.inherit_from.clone(),
        shared: SharedFields {
            assigner: policy.assigner.clone(),
            assignee: policy.assignee.clone(),
            target: policy.target.clone(),
            action: policy.action.clone(),
        },
        extensions: policy.extensions.clone(),
        rules: Vec::with_capacity(queue.len()),
        permissions: Vec::new(),
        prohibitions: Vec::new(),
        obligations: Vec::new(),
        digest: String::new(),
    };

    while let Some(work) = queue.pop_front() {
        if work.depth > config.max_fallback_depth {
            return Err(StructuralError::FallbackDepthExceeded {
                path: work.path,
                depth: work.depth,
                max: config.max_fallback_depth,
            });
        }

        let index = RuleIndex(out.rules.len());
        let inherited = match work.parent.and_then(|p| out.rules.get(p.0)) {
            Some(parent) => SharedFields {
                assigner: parent.assigner.clone(),
                assignee: parent.assignee.clone(),
                target: parent.target.clone(),
                action: parent.action.clone(),
            },
            None => out.shared.clone(),
        };

        let fallback_role = work.role.fallback_role();
        for (j, duty) in work.fallbacks.iter().enumerate() {
            queue.push_back(Work {
                rule: &duty.rule,
                fallbacks: &duty.consequence,
                role: fallback_role,
                parent: Some(index),
                depth: work.depth + 1,
                path: format!("{}.{}[{j}]", work.path, fallback_role.document_key()),
            });
        }

        let rule = work.rule;
        out.rules.push(NormalizedRule {
            index,
            role: work.role,
            uid: rule.uid.clone(),
            path: work.path,
            assigner: rule.assigner.clone().or(inherited.assigner),
            assignee: rule.assignee.clone().or(inherited.assignee),
            target: rule.target.clone().or(inherited.target),
            action: if rule.action.is_empty() {
                inherited.action
            } else {
                rule.action.clone()
            },
            constraint: rule.constraint.clone(),
            parent: work.parent,
            depth: work.depth,
            fallbacks: Vec::new(),
            extensions: rule.extensions.clone(),
        });

        match work.role {
            RuleRole::Permission => out.permissions.push(index),
            RuleRole::Prohibition => out.prohibitions.push(index),
            RuleRole::Obligation => out.obligations.push(index),
            RuleRole::Precondition | RuleRole::Remedy | RuleRole::Consequence => {
                if let Some(parent) = work.parent.and_then(|p| out.rules.get_mut(p.0)) {
                    parent.fallbacks.push(index);
                }
            }
        }
    }

    out.digest = content_digest(&out);
    tracing::debug!(
        policy = ?out.uid,
        digest = %out.digest,
        rules = out.rules.len(),
        permissions = out.permissions.len(),
        prohibitions = out.prohibitions.len(),
        obligations = out.obligations.len(),
        "normalized policy"
    );
    Ok(out)
}

/// Hash the flat arena rather than the rebuilt tree, so arbitrarily deep
/// fallback chains never serialize recursively.
fn content_digest(policy: &NormalizedPolicy) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&policy.uid).unwrap_or_default());
    hasher.update(policy.policy_type.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(policy.conflict.to_string().as_bytes());
    hasher.update(b"\0");
    hasher.update(serde_json::to_vec(&policy.shared).unwrap_or_default());
    for rule in &policy.rules {
        hasher.update(b"\0");
        hasher.update(serde_json::to_vec(rule).unwrap_or_default());
    }
    hasher.finalize()[..8].iter().map(|b| format!("{b:02x}")).collect()
}

fn top_level<'p>(rule: &'p Rule, fallbacks: &'p [Duty], role: RuleRole, i: usize) -> Work<'p> {
    Work {
        rule,
        fallbacks,
        role,
        parent: None,
        depth: 0,
        path: format!("{}[{i}]", role.document_key()),
    }
}
