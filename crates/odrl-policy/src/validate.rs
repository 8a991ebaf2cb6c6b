//! # Structural Validation
//!
//! Checks a normalized policy against the structural invariants the
//! decision engine relies on, and produces the [`ValidatedPolicy`] gate
//! type that the engine accepts.
//!
//! ## Checks
//!
//! - An atomic constraint declares exactly one of `rightOperand` and
//!   `rightOperandReference`.
//! - A composite constraint has at least one member, recursively, in rule
//!   constraints and action refinements alike.
//! - Every rule has at least one action after inheritance.
//! - No rule sits deeper than `max_fallback_depth`.
//!
//! An unrecognized policy type or conflict strategy is not a violation.
//! ODRL is extensible, so both pass through and are logged at `warn`.

use std::ops::Deref;

use odrl_core::{
    Action, Constraint, EngineConfig, OperandForm, Policy, StructuralError, Violation,
    ViolationKind, Violations,
};

use crate::normalize::{normalize, NormalizedPolicy};

/// A normalized policy that passed validation.
///
/// Only [`check`] (and [`compile`]) construct one, so holding a
/// `ValidatedPolicy` proves the structural invariants hold.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPolicy(NormalizedPolicy);

impl ValidatedPolicy {
    /// The underlying normalized policy.
    pub fn policy(&self) -> &NormalizedPolicy {
        &self.0
    }

    /// Unwrap into the normalized policy.
    pub fn into_inner(self) -> NormalizedPolicy {
        self.0
    }
}

impl Deref for ValidatedPolicy {
    type Target = NormalizedPolicy;

    fn deref(&self) -> &NormalizedPolicy {
        &self.0
    }
}

/// Collect every structural violation in `policy`, in arena order.
pub fn validate(policy: &NormalizedPolicy, config: &EngineConfig) -> Violations {
    let mut violations = Violations::default();

    if !policy.policy_type.is_recognized() {
        tracing::warn!(
            policy = ?policy.uid,
            policy_type = %policy.policy_type,
            "unrecognized policy type"
        );
    }
    if !policy.conflict.is_recognized() {
        tracing::warn!(
            policy = ?policy.uid,
            conflict = %policy.conflict,
            "unrecognized conflict strategy; conflicts will be left undetermined"
        );
    }

    check_actions(&policy.shared.action, "action", &mut violations);

    for rule in policy.rules() {
        if rule.action.is_empty() {
            violations.push(Violation::new(rule.path.clone(), ViolationKind::MissingAction));
        }
        if rule.depth > config.max_fallback_depth {
            violations.push(Violation::new(
                rule.path.clone(),
                ViolationKind::FallbackDepthExceeded {
                    depth: rule.depth,
                    max: config.max_fallback_depth,
                },
            ));
        }
        for (i, c) in rule.constraint.iter().enumerate() {
            check_constraint(c, format!("{}.constraint[{i}]", rule.path), &mut violations);
        }
        check_actions(&rule.action, &format!("{}.action", rule.path), &mut violations);
    }

    if !violations.is_empty() {
        tracing::debug!(policy = ?policy.uid, count = violations.len(), "policy failed validation");
    }
    violations
}

/// Validate and, if clean, wrap as a [`ValidatedPolicy`].
pub fn check(
    policy: NormalizedPolicy,
    config: &EngineConfig,
) -> Result<ValidatedPolicy, StructuralError> {
    let violations = validate(&policy, config);
    if violations.is_empty() {
        Ok(ValidatedPolicy(policy))
    } else {
        Err(StructuralError::Invalid(violations))
    }
}

/// Normalize then check.
pub fn compile(policy: &Policy, config: &EngineConfig) -> Result<ValidatedPolicy, StructuralError> {
    check(normalize(policy, config)?, config)
}

fn check_actions(actions: &[Action], path: &str, out: &mut Violations) {
    for (j, action) in actions.iter().enumerate() {
        for (k, c) in action.refinements().iter().enumerate() {
            check_constraint(c, format!("{path}[{j}].refinement[{k}]"), out);
        }
    }
}

fn check_constraint(root: &Constraint, path: String, out: &mut Violations) {
    let mut stack = vec![(root, path)];
    while let Some((node, path)) = stack.pop() {
        match node {
            Constraint::Atomic(a) => match a.operand_form() {
                OperandForm::Literal | OperandForm::Reference => {}
                OperandForm::Both => {
                    out.push(Violation::new(path, ViolationKind::BothOperandForms))
                }
                OperandForm::Neither => {
                    out.push(Violation::new(path, ViolationKind::MissingOperand))
                }
            },
            Constraint::Composite(c) => {
                if c.constraints.is_empty() {
                    out.push(Violation::new(path, ViolationKind::EmptyComposite));
                    continue;
                }
                // Reverse so members pop in document order.
                for (i, member) in c.constraints.iter().enumerate().rev() {
                    stack.push((member, format!("{path}.{}[{i}]", c.operator)));
                }
            }
        }
    }
}
