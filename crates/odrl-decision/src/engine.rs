//! # Decision Engine
//!
//! Answers whether a request is permitted under a validated policy, and
//! which duties it triggers.
//!
//! ## Algorithm
//!
//! 1. A rule applies when its action governs the requested action through
//!    the action hierarchy, its target and parties match (an absent field
//!    matches anything), and its constraints and action refinements
//!    evaluate to `Satisfied`.
//! 2. Matching prohibitions deny. A prohibition whose constraints are
//!    `Indeterminate` may deny, so it blocks a permit unless the strategy
//!    is `perm`.
//! 3. Matching permissions permit once every precondition duty is
//!    `Fulfilled` in the duty view. Otherwise the permit is pending and the
//!    unmet preconditions are surfaced. An `Indeterminate` permission
//!    never permits.
//! 4. When both apply, the policy's conflict strategy decides: `perm`
//!    permits, `prohibit` denies, `invalid` and unrecognized strategies
//!    leave the request undetermined.
//! 5. With nothing applicable the request is denied.
//!
//! Remedies of matching prohibitions are surfaced whenever the decision
//! is not `Permitted`. Top-level obligations are surfaced when their
//! parties match the request and their constraints are `Satisfied`.
//!
//! ## Determinism
//!
//! Rules are visited in arena order and surfaced duties are ordered by
//! group then arena index, so the same policy, request, context and duty
//! view always produce the same verdict.

use std::collections::BTreeSet;

use odrl_constraint::{ConstraintEvaluator, Outcome};
use odrl_core::{ActionHierarchy, ConflictStrategy, EngineConfig, Request};
use odrl_policy::{NormalizedPolicy, NormalizedRule, RuleIndex, ValidatedPolicy};

use crate::ledger::{DutyState, DutyStatusView, NoDuties};
use crate::verdict::{Decision, DutyKey, DutyOrigin, TriggeredDuty, Verdict};

static NO_DUTIES: NoDuties = NoDuties;

/// Decides requests against validated policies.
///
/// Borrows its collaborators and holds no mutable state, so one engine
/// can serve concurrent requests.
#[derive(Clone, Copy)]
pub struct DecisionEngine<'a> {
    hierarchy: &'a ActionHierarchy,
    evaluator: ConstraintEvaluator<'a>,
    duties: &'a dyn DutyStatusView,
}

impl std::fmt::Debug for DecisionEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("hierarchy", self.hierarchy)
            .field("evaluator", &self.evaluator)
            .finish_non_exhaustive()
    }
}

impl<'a> DecisionEngine<'a> {
    /// An engine using `config`'s action hierarchy, the default constraint
    /// evaluator, and a duty view in which nothing is fulfilled.
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            hierarchy: &config.action_hierarchy,
            evaluator: ConstraintEvaluator::new(),
            duties: &NO_DUTIES,
        }
    }

    /// Builder: evaluate constraints with `evaluator`.
    pub fn with_evaluator(mut self, evaluator: ConstraintEvaluator<'a>) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Builder: read precondition states from `duties`.
    pub fn with_duties(mut self, duties: &'a dyn DutyStatusView) -> Self {
        self.duties = duties;
        self
    }

    /// Decide `request` under `policy`.
    pub fn decide(&self, policy: &ValidatedPolicy, request: &Request) -> Verdict {
        let policy = policy.policy();

        let mut matched_prohibitions = Vec::new();
        let mut indeterminate_prohibition = false;
        for rule in policy.prohibitions() {
            match self.applies(rule, request) {
                Some(Outcome::Satisfied) => matched_prohibitions.push(rule.index),
                Some(Outcome::Indeterminate) => {
                    tracing::debug!(rule = %policy.rule_key(rule), "prohibition indeterminate");
                    indeterminate_prohibition = true;
                }
                Some(Outcome::Violated) | None => {}
            }
        }

        let mut matched_permissions = Vec::new();
        let mut granted = false;
        let mut preconditions = Vec::new();
        for rule in policy.permissions() {
            if self.applies(rule, request) != Some(Outcome::Satisfied) {
                continue;
            }
            matched_permissions.push(rule.index);
            let unmet: Vec<&NormalizedRule> = policy
                .fallbacks(rule)
                .filter(|duty| {
                    let key = DutyKey::new(policy.rule_key(duty));
                    self.duties.duty_state(&key) != Some(DutyState::Fulfilled)
                })
                .collect();
            if unmet.is_empty() {
                granted = true;
            } else {
                tracing::debug!(
                    rule = %policy.rule_key(rule),
                    unmet = unmet.len(),
                    "permission pending preconditions"
                );
                preconditions.extend(unmet.into_iter().map(|d| (d, rule.index)));
            }
        }

        let permits = !matched_permissions.is_empty();
        let denies = !matched_prohibitions.is_empty();
        let conflict = permits && denies;
        let decision = match (permits, denies) {
            (true, true) => match &policy.conflict {
                ConflictStrategy::Perm if granted => Decision::Permitted,
                ConflictStrategy::Perm => Decision::Undetermined,
                ConflictStrategy::Prohibit => Decision::Denied,
                ConflictStrategy::Invalid | ConflictStrategy::Unresolved(_) => {
                    Decision::Undetermined
                }
            },
            (false, true) => Decision::Denied,
            (true, false) if !granted => Decision::Undetermined,
            (true, false)
                if indeterminate_prohibition && policy.conflict != ConflictStrategy::Perm =>
            {
                Decision::Undetermined
            }
            (true, false) => Decision::Permitted,
            (false, false) => Decision::Denied,
        };

        let mut surfaced = Vec::new();
        if decision != Decision::Permitted {
            for &index in &matched_prohibitions {
                let Some(prohibition) = policy.rule(index) else { continue };
                surfaced.extend(
                    policy
                        .fallbacks(prohibition)
                        .map(|r| (r, DutyOrigin::Remedy, index)),
                );
            }
        }
        surfaced.extend(
            preconditions
                .into_iter()
                .map(|(r, source)| (r, DutyOrigin::Precondition, source)),
        );
        for rule in policy.obligations() {
            if self.obligation_applies(rule, request) {
                surfaced.push((rule, DutyOrigin::Obligation, rule.index));
            }
        }

        let mut seen = BTreeSet::new();
        let obligations = surfaced
            .into_iter()
            .filter(|(rule, _, _)| seen.insert(rule.index))
            .map(|(rule, origin, source)| trigger(policy, rule, origin, source))
            .collect();

        tracing::debug!(
            policy = ?policy.uid,
            action = %request.action,
            assignee = %request.assignee,
            target = %request.target,
            %decision,
            conflict,
            "request decided"
        );

        Verdict {
            decision,
            conflict,
            obligations,
            matched_permissions,
            matched_prohibitions,
        }
    }

    /// `None` when the rule's scope excludes the request; otherwise the
    /// meet of its refinement and constraint outcomes.
    fn applies(&self, rule: &NormalizedRule, request: &Request) -> Option<Outcome> {
        if !in_scope(&rule.target, &request.target) || !self.parties_match(rule, request) {
            return None;
        }
        let governing: Vec<_> = rule
            .action
            .iter()
            .filter(|a| self.hierarchy.includes(a.name(), &request.action))
            .collect();
        if governing.is_empty() {
            return None;
        }
        let refinement = Outcome::any(
            governing
                .iter()
                .map(|a| self.evaluator.evaluate_all(a.refinements(), request)),
        );
        Some(refinement.meet(self.evaluator.evaluate_all(&rule.constraint, request)))
    }

    fn obligation_applies(&self, rule: &NormalizedRule, request: &Request) -> bool {
        self.parties_match(rule, request)
            && self.evaluator.evaluate_all(&rule.constraint, request) == Outcome::Satisfied
    }

    fn parties_match(&self, rule: &NormalizedRule, request: &Request) -> bool {
        let assigner = match &request.assigner {
            Some(assigner) => in_scope(&rule.assigner, assigner),
            None => true,
        };
        assigner && in_scope(&rule.assignee, &request.assignee)
    }
}

fn in_scope(declared: &Option<Vec<String>>, requested: &str) -> bool {
    match declared {
        Some(values) => values.iter().any(|v| v == requested),
        None => true,
    }
}

/// Build the surfaced form of `rule` with its consequence chain.
///
/// The chain is flattened breadth-first and assembled bottom-up, so its
/// depth never reaches the call stack.
fn trigger(
    policy: &NormalizedPolicy,
    rule: &NormalizedRule,
    origin: DutyOrigin,
    source: RuleIndex,
) -> TriggeredDuty {
    // (rule, position of its parent in `order`)
    let mut order: Vec<(&NormalizedRule, usize)> = vec![(rule, 0)];
    let mut next = 0;
    while next < order.len() {
        let parent = order[next].0;
        order.extend(policy.fallbacks(parent).map(|c| (c, next)));
        next += 1;
    }

    let mut children: Vec<Vec<TriggeredDuty>> = vec![Vec::new(); order.len()];
    for pos in (1..order.len()).rev() {
        let (current, parent) = order[pos];
        let mut consequences = std::mem::take(&mut children[pos]);
        consequences.reverse();
        let declared_by = order[parent].0.index;
        let duty = surface(policy, current, DutyOrigin::Consequence, declared_by, consequences);
        children[parent].push(duty);
    }
    let mut consequences = std::mem::take(&mut children[0]);
    consequences.reverse();
    surface(policy, rule, origin, source, consequences)
}

fn surface(
    policy: &NormalizedPolicy,
    rule: &NormalizedRule,
    origin: DutyOrigin,
    source: RuleIndex,
    consequences: Vec<TriggeredDuty>,
) -> TriggeredDuty {
    TriggeredDuty {
        key: DutyKey::new(policy.rule_key(rule)),
        rule: rule.index,
        origin,
        source_rule: source,
        actions: rule.action.clone(),
        target: rule.target.clone(),
        assignee: rule.assignee.clone(),
        consequences,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DutyLedger;
    use odrl_core::{
        Action, Constraint, Duty, Operator, Permission, Policy, Prohibition, Rule,
    };
    use odrl_policy::compile;

    const ALICE: &str = "urn:party:alice";
    const BOB: &str = "urn:party:bob";
    const ASSET: &str = "urn:asset:report";

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn decide(policy: &Policy, request: &Request) -> Verdict {
        let config = config();
        let validated = compile(policy, &config).unwrap();
        DecisionEngine::new(&config).decide(&validated, request)
    }

    fn use_by(assignee: &str) -> Request {
        Request::new("use", assignee, ASSET)
    }

    fn permit_use() -> Permission {
        Permission::new(Rule::new("use").with_target(ASSET).with_assignee(ALICE))
    }

    #[test]
    fn nothing_applicable_is_denied() {
        let v = decide(&Policy::default(), &use_by(ALICE));
        assert_eq!(v.decision, Decision::Denied);
        assert!(!v.conflict);
        assert!(v.obligations.is_empty());
    }

    #[test]
    fn matching_permission_permits() {
        let p = Policy::default().with_permission(permit_use());
        let v = decide(&p, &use_by(ALICE));
        assert!(v.is_permitted());
        assert_eq!(v.matched_permissions.len(), 1);
    }

    #[test]
    fn assignee_and_target_scope() {
        let p = Policy::default().with_permission(permit_use());
        assert_eq!(decide(&p, &use_by(BOB)).decision, Decision::Denied);
        let other_asset = Request::new("use", ALICE, "urn:asset:other");
        assert_eq!(decide(&p, &other_asset).decision, Decision::Denied);
    }

    #[test]
    fn absent_fields_match_anything() {
        let p = Policy::default().with_permission(Permission::new(Rule::new("use")));
        assert!(decide(&p, &use_by(BOB)).is_permitted());
    }

    #[test]
    fn assigner_checked_only_when_requested() {
        let p = Policy::default()
            .with_assigner("urn:org:acme")
            .with_permission(Permission::new(Rule::new("use")));
        assert!(decide(&p, &use_by(BOB)).is_permitted());
        assert!(decide(&p, &use_by(BOB).with_assigner("urn:org:acme")).is_permitted());
        assert_eq!(
            decide(&p, &use_by(BOB).with_assigner("urn:org:other")).decision,
            Decision::Denied
        );
    }

    #[test]
    fn hierarchy_grants_narrower_action() {
        let p = Policy::default().with_permission(Permission::new(Rule::new("use")));
        let v = decide(&p, &Request::new("print", BOB, ASSET));
        assert!(v.is_permitted());

        let narrow = Policy::default().with_permission(Permission::new(Rule::new("print")));
        assert_eq!(decide(&narrow, &use_by(BOB)).decision, Decision::Denied);
    }

    #[test]
    fn conflict_strategies() {
        let base = Policy::default()
            .with_permission(permit_use())
            .with_prohibition(Prohibition::new(Rule::new("use").with_target(ASSET)));

        let v = decide(&base.clone().with_conflict(ConflictStrategy::Perm), &use_by(ALICE));
        assert_eq!((v.decision, v.conflict), (Decision::Permitted, true));

        let v = decide(&base.clone().with_conflict(ConflictStrategy::Prohibit), &use_by(ALICE));
        assert_eq!((v.decision, v.conflict), (Decision::Denied, true));

        let v = decide(&base.clone().with_conflict(ConflictStrategy::Invalid), &use_by(ALICE));
        assert_eq!((v.decision, v.conflict), (Decision::Undetermined, true));

        let v = decide(&base.with_conflict(ConflictStrategy::from("ex:newest")), &use_by(ALICE));
        assert_eq!((v.decision, v.conflict), (Decision::Undetermined, true));
    }

    #[test]
    fn prohibition_remedy_surfaced_on_denial() {
        let p = Policy::default().with_prohibition(
            Prohibition::new(Rule::new("distribute").with_uid("urn:prohibition:1"))
                .with_remedy(Duty::new(Rule::new("delete").with_uid("urn:duty:delete"))),
        );
        let v = decide(&p, &Request::new("distribute", BOB, ASSET));
        assert_eq!(v.decision, Decision::Denied);
        assert_eq!(v.obligation_actions(), vec!["delete"]);
        assert_eq!(v.obligations[0].origin, DutyOrigin::Remedy);
        assert_eq!(v.obligations[0].key, DutyKey::from("urn:duty:delete"));
        assert_eq!(v.obligations[0].source_rule, v.matched_prohibitions[0]);
    }

    #[test]
    fn remedy_not_surfaced_when_permission_overrides() {
        let p = Policy::default()
            .with_conflict(ConflictStrategy::Perm)
            .with_permission(Permission::new(Rule::new("use")))
            .with_prohibition(
                Prohibition::new(Rule::new("use")).with_remedy(Duty::new(Rule::new("delete"))),
            );
        let v = decide(&p, &use_by(BOB));
        assert!(v.is_permitted());
        assert!(v.obligations.is_empty());
    }

    #[test]
    fn unmet_precondition_is_pending_until_fulfilled() {
        let p = Policy::default().with_permission(
            Permission::new(Rule::new("play").with_target(ASSET))
                .with_duty(Duty::new(Rule::new("compensate").with_uid("urn:duty:pay"))),
        );
        let config = config();
        let validated = compile(&p, &config).unwrap();
        let request = Request::new("play", BOB, ASSET);

        let v = DecisionEngine::new(&config).decide(&validated, &request);
        assert_eq!(v.decision, Decision::Undetermined);
        assert_eq!(v.obligation_actions(), vec!["compensate"]);
        assert_eq!(v.obligations[0].origin, DutyOrigin::Precondition);

        let mut ledger = DutyLedger::new();
        ledger.register(&v.obligations[0], None);
        let at = chrono::Utc::now();
        ledger.record_fulfillment(&v.obligations[0].key, at).unwrap();

        let v = DecisionEngine::new(&config).with_duties(&ledger).decide(&validated, &request);
        assert!(v.is_permitted());
        assert!(v.obligations.is_empty());
    }

    #[test]
    fn constraint_gates_permission() {
        let p = Policy::default().with_permission(Permission::new(
            Rule::new("print").with_constraint(Constraint::atomic("count", Operator::Lteq, 10)),
        ));
        let ok = Request::new("print", BOB, ASSET).with_operand("count", 5);
        let over = Request::new("print", BOB, ASSET).with_operand("count", 11);
        let unknown = Request::new("print", BOB, ASSET);
        assert!(decide(&p, &ok).is_permitted());
        assert_eq!(decide(&p, &over).decision, Decision::Denied);
        // An unknown operand never grants.
        assert_eq!(decide(&p, &unknown).decision, Decision::Denied);
    }

    #[test]
    fn indeterminate_prohibition_blocks_permit_unless_perm() {
        let prohibition = Prohibition::new(
            Rule::new("use").with_constraint(Constraint::atomic("spatial", Operator::Eq, "EU")),
        );
        let p = Policy::default()
            .with_permission(Permission::new(Rule::new("use")))
            .with_prohibition(prohibition);
        let v = decide(&p, &use_by(BOB));
        assert_eq!(v.decision, Decision::Undetermined);
        assert!(!v.conflict);

        let v = decide(&p.clone().with_conflict(ConflictStrategy::Perm), &use_by(BOB));
        assert!(v.is_permitted());

        let v = decide(&p, &use_by(BOB).with_operand("spatial", "US"));
        assert!(v.is_permitted());
    }

    #[test]
    fn refinement_narrows_action() {
        let action = Action::refined(
            "print",
            vec![Constraint::atomic("resolution", Operator::Lteq, 1200)],
        );
        let p = Policy::default().with_permission(Permission::new(Rule::new(action)));
        let low = Request::new("print", BOB, ASSET).with_operand("resolution", 600);
        let high = Request::new("print", BOB, ASSET).with_operand("resolution", 2400);
        assert!(decide(&p, &low).is_permitted());
        assert_eq!(decide(&p, &high).decision, Decision::Denied);
    }

    #[test]
    fn obligations_surface_with_consequences() {
        let p = Policy::default()
            .with_permission(Permission::new(Rule::new("use")))
            .with_obligation(
                Duty::new(Rule::new("compensate").with_assignee(BOB).with_uid("urn:duty:pay"))
                    .with_consequence(Duty::new(Rule::new("compensate").with_uid("urn:duty:fine"))),
            );
        let v = decide(&p, &use_by(BOB));
        assert!(v.is_permitted());
        assert_eq!(v.obligations.len(), 1);
        let duty = &v.obligations[0];
        assert_eq!(duty.origin, DutyOrigin::Obligation);
        assert_eq!(duty.consequences.len(), 1);
        assert_eq!(duty.consequences[0].key, DutyKey::from("urn:duty:fine"));
        assert_eq!(duty.consequences[0].origin, DutyOrigin::Consequence);
        assert_eq!(duty.consequences[0].source_rule, duty.rule);

        // Obligations on another party are not surfaced.
        assert!(decide(&p, &use_by(ALICE)).obligations.is_empty());
    }

    #[test]
    fn surfaced_order_is_remedies_preconditions_obligations() {
        let p = Policy::default()
            .with_conflict(ConflictStrategy::Invalid)
            .with_obligation(Duty::new(Rule::new("inform")))
            .with_permission(
                Permission::new(Rule::new("use")).with_duty(Duty::new(Rule::new("attribute"))),
            )
            .with_prohibition(
                Prohibition::new(Rule::new("use")).with_remedy(Duty::new(Rule::new("delete"))),
            );
        let v = decide(&p, &use_by(BOB));
        assert_eq!(v.decision, Decision::Undetermined);
        assert!(v.conflict);
        assert_eq!(v.obligation_actions(), vec!["delete", "attribute", "inform"]);
    }

    #[test]
    fn generated_precondition_keys_do_not_leak_across_policies() {
        let config = config();
        let gated = |uid: &str, duty: &str| {
            let p = Policy::default()
                .with_uid(uid)
                .with_permission(
                    Permission::new(Rule::new("use")).with_duty(Duty::new(Rule::new(duty))),
                );
            compile(&p, &config).unwrap()
        };
        let a = gated("urn:p:a", "compensate");
        let b = gated("urn:p:b", "attribute");

        let mut ledger = DutyLedger::new();
        let pending = DecisionEngine::new(&config).decide(&a, &use_by(BOB));
        ledger.register(&pending.obligations[0], None);
        ledger
            .record_fulfillment(&pending.obligations[0].key, chrono::Utc::now())
            .unwrap();

        let engine = DecisionEngine::new(&config).with_duties(&ledger);
        assert!(engine.decide(&a, &use_by(BOB)).is_permitted());
        let v = engine.decide(&b, &use_by(BOB));
        assert_eq!(v.decision, Decision::Undetermined);
        assert_eq!(v.obligation_actions(), vec!["attribute"]);
    }

    #[test]
    fn deep_consequence_chain_is_surfaced() {
        const DEPTH: usize = 1000;
        let config = config().with_max_fallback_depth(DEPTH + 1);
        let mut duty = Duty::new(Rule::new("compensate"));
        for _ in 0..DEPTH {
            duty = Duty::new(Rule::new("compensate")).with_consequence(duty);
        }
        let p = Policy::default().with_obligation(duty);
        let validated = compile(&p, &config).unwrap();
        let v = DecisionEngine::new(&config).decide(&validated, &use_by(BOB));
        assert_eq!(v.obligations.len(), 1);

        let mut depth = 0;
        let mut current = &v.obligations[0];
        while let Some(next) = current.consequences.first() {
            assert_eq!(next.origin, DutyOrigin::Consequence);
            assert_eq!(next.source_rule, current.rule);
            current = next;
            depth += 1;
        }
        assert_eq!(depth, DEPTH);
    }

    #[test]
    fn decide_is_deterministic() {
        let p = Policy::default()
            .with_permission(
                Permission::new(Rule::new("use")).with_duty(Duty::new(Rule::new("attribute"))),
            )
            .with_obligation(Duty::new(Rule::new("inform")));
        let a = decide(&p, &use_by(BOB));
        let b = decide(&p, &use_by(BOB));
        assert_eq!(a, b);
    }
}
