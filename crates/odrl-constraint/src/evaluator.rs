//! # Constraint Evaluator
//!
//! Evaluates atomic and composite constraints against a request.
//!
//! ## Design
//!
//! - Missing data is never an error. An unknown left operand, an
//!   undereferenceable right operand, incomparable types, a unit mismatch
//!   and an unregistered profile term all produce `Indeterminate`.
//! - Evaluation is total over malformed input: an empty composite is
//!   `Indeterminate` and an atomic constraint carrying both operand forms
//!   uses the literal.
//! - The evaluator borrows its collaborators and holds no mutable state,
//!   so one instance can be shared across threads.

use serde_json::Value;

use odrl_core::vocab::local_name;
use odrl_core::{
    AtomicConstraint, CompositeConstraint, Constraint, LogicalOperator, OperandValue, Operator,
    Request,
};

use crate::context::{
    ContextSupplier, Lookup, NoReferences, OperandResolver, RequestOperands, Resolution,
};
use crate::outcome::Outcome;
use crate::registry::ProfileRegistry;
use crate::value::TypedValue;

static REQUEST_OPERANDS: RequestOperands = RequestOperands;
static NO_REFERENCES: NoReferences = NoReferences;
static EMPTY_REGISTRY: ProfileRegistry = ProfileRegistry::new();

/// Evaluates constraints against requests.
#[derive(Clone, Copy)]
pub struct ConstraintEvaluator<'a> {
    supplier: &'a dyn ContextSupplier,
    resolver: &'a dyn OperandResolver,
    registry: &'a ProfileRegistry,
}

impl std::fmt::Debug for ConstraintEvaluator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConstraintEvaluator")
            .field("registry", self.registry)
            .finish_non_exhaustive()
    }
}

impl Default for ConstraintEvaluator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ConstraintEvaluator<'a> {
    /// An evaluator reading operands from the request, resolving no
    /// references, with no profile extensions.
    pub fn new() -> Self {
        Self {
            supplier: &REQUEST_OPERANDS,
            resolver: &NO_REFERENCES,
            registry: &EMPTY_REGISTRY,
        }
    }

    /// Builder: use `supplier` for left operands.
    pub fn with_supplier(mut self, supplier: &'a dyn ContextSupplier) -> Self {
        self.supplier = supplier;
        self
    }

    /// Builder: use `resolver` for right-operand references.
    pub fn with_resolver(mut self, resolver: &'a dyn OperandResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Builder: use `registry` for profile-defined terms.
    pub fn with_registry(mut self, registry: &'a ProfileRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Evaluate one constraint.
    pub fn evaluate(&self, constraint: &Constraint, request: &Request) -> Outcome {
        match constraint {
            Constraint::Atomic(a) => self.evaluate_atomic(a, request),
            Constraint::Composite(c) => self.evaluate_composite(c, request),
        }
    }

    /// Evaluate a rule's constraint list: all must hold. An empty list is
    /// `Satisfied`, since a rule without constraints is unconditional.
    pub fn evaluate_all(&self, constraints: &[Constraint], request: &Request) -> Outcome {
        constraints
            .iter()
            .map(|c| self.evaluate(c, request))
            .fold(Outcome::Satisfied, Outcome::meet)
    }

    fn evaluate_atomic(&self, a: &AtomicConstraint, request: &Request) -> Outcome {
        let left = match self.supplier.lookup(&a.left_operand, request) {
            Lookup::Found(v) => v,
            Lookup::Unknown => match &a.status {
                Some(status) => OperandValue::from(status.clone()),
                None => {
                    tracing::trace!(operand = %a.left_operand, "left operand unknown");
                    return Outcome::Indeterminate;
                }
            },
        };

        let resolved;
        let right: &Value = match (&a.right_operand, &a.right_operand_reference) {
            (Some(literal), _) => literal,
            (None, Some(iri)) => match self.resolver.resolve(iri) {
                Resolution::Value(v) => {
                    resolved = v;
                    &resolved
                }
                Resolution::Unavailable => {
                    tracing::trace!(iri = %iri, "right operand reference unavailable");
                    return Outcome::Indeterminate;
                }
            },
            (None, None) => return Outcome::Indeterminate,
        };

        if let Operator::Custom(term) = &a.operator {
            return match self.registry.operator(term) {
                Some(evaluator) => evaluator.evaluate(&left, right, a),
                None => {
                    tracing::debug!(operator = %term, "no evaluator registered for operator");
                    Outcome::Indeterminate
                }
            };
        }

        if let (Some(expected), Some(actual)) = (&a.unit, &left.unit) {
            if local_name(expected) != local_name(actual) {
                tracing::trace!(expected = %expected, actual = %actual, "unit mismatch");
                return Outcome::Indeterminate;
            }
        }

        let data_type = a.data_type.as_deref();
        let l = TypedValue::coerce(&left.value, data_type);
        let r = TypedValue::coerce(right, data_type);
        compare(&a.operator, &l, &r)
    }

    fn evaluate_composite(&self, c: &CompositeConstraint, request: &Request) -> Outcome {
        if c.constraints.is_empty() {
            return Outcome::Indeterminate;
        }
        let members = c.constraints.iter().map(|m| self.evaluate(m, request));
        match &c.operator {
            LogicalOperator::And => Outcome::all(members),
            LogicalOperator::Or => Outcome::any(members),
            LogicalOperator::Xone => Outcome::exactly_one(members),
            LogicalOperator::AndSequence => {
                let mut acc = Outcome::Satisfied;
                for outcome in members {
                    if outcome == Outcome::Violated {
                        return Outcome::Violated;
                    }
                    acc = acc.meet(outcome);
                }
                acc
            }
            LogicalOperator::Custom(term) => match self.registry.logical(term) {
                Some(combinator) => combinator.combine(&members.collect::<Vec<_>>()),
                None => {
                    tracing::debug!(
                        operator = %term,
                        "no combinator registered for logical operator"
                    );
                    Outcome::Indeterminate
                }
            },
        }
    }
}

fn compare(operator: &Operator, l: &TypedValue, r: &TypedValue) -> Outcome {
    match operator {
        Operator::Eq => Outcome::from_bool(l.same_as(r)),
        Operator::Neq => Outcome::from_bool(!l.same_as(r)),
        Operator::Gt | Operator::Gteq | Operator::Lt | Operator::Lteq => match l.ordinal_cmp(r) {
            Some(ord) => Outcome::from_bool(match operator {
                Operator::Gt => ord.is_gt(),
                Operator::Gteq => ord.is_ge(),
                Operator::Lt => ord.is_lt(),
                _ => ord.is_le(),
            }),
            None => Outcome::Indeterminate,
        },
        Operator::IsAnyOf => Outcome::from_bool(intersects(l, r)),
        Operator::IsNoneOf => Outcome::from_bool(!intersects(l, r)),
        Operator::IsAllOf => Outcome::from_bool(
            r.members()
                .iter()
                .all(|y| l.members().iter().any(|x| x.same_as(y))),
        ),
        Operator::Custom(_) => Outcome::Indeterminate,
    }
}

fn intersects(l: &TypedValue, r: &TypedValue) -> bool {
    l.members()
        .iter()
        .any(|x| r.members().iter().any(|y| x.same_as(y)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticReferences;
    use crate::registry::{LogicalEvaluator, OperatorEvaluator};
    use serde_json::json;

    fn count_le_5() -> Constraint {
        Constraint::atomic("count", Operator::Lteq, 5)
    }

    fn req() -> Request {
        Request::new("use", "urn:party:a", "urn:asset:t")
    }

    fn sat(name: &str) -> Constraint {
        Constraint::atomic(name, Operator::Eq, 1)
    }

    #[test]
    fn count_lteq_five() {
        let e = ConstraintEvaluator::new();
        assert_eq!(e.evaluate(&count_le_5(), &req().with_operand("count", 3)), Outcome::Satisfied);
        assert_eq!(e.evaluate(&count_le_5(), &req().with_operand("count", 9)), Outcome::Violated);
        assert_eq!(e.evaluate(&count_le_5(), &req()), Outcome::Indeterminate);
    }

    #[test]
    fn status_used_when_operand_unknown() {
        let c: Constraint = AtomicConstraint::new("count", Operator::Lt, 10).status(4).into();
        let e = ConstraintEvaluator::new();
        assert_eq!(e.evaluate(&c, &req()), Outcome::Satisfied);
        assert_eq!(e.evaluate(&c, &req().with_operand("count", 11)), Outcome::Violated);
    }

    #[test]
    fn reference_resolution() {
        let c: Constraint =
            AtomicConstraint::with_reference("count", Operator::Lteq, "http://x/limit").into();
        let refs = StaticReferences::new().with("http://x/limit", 5);
        let with_refs = ConstraintEvaluator::new().with_resolver(&refs);
        let r = req().with_operand("count", 5);
        assert_eq!(with_refs.evaluate(&c, &r), Outcome::Satisfied);
        assert_eq!(ConstraintEvaluator::new().evaluate(&c, &r), Outcome::Indeterminate);
    }

    #[test]
    fn both_forms_prefers_literal() {
        let mut a = AtomicConstraint::new("count", Operator::Eq, 1);
        a.right_operand_reference = Some("http://x/limit".into());
        let refs = StaticReferences::new().with("http://x/limit", 2);
        let e = ConstraintEvaluator::new().with_resolver(&refs);
        assert_eq!(e.evaluate(&a.into(), &req().with_operand("count", 1)), Outcome::Satisfied);
    }

    #[test]
    fn ordinal_on_mismatched_types_is_indeterminate() {
        let c = Constraint::atomic("count", Operator::Gt, 5);
        let e = ConstraintEvaluator::new();
        assert_eq!(e.evaluate(&c, &req().with_operand("count", "many")), Outcome::Indeterminate);
    }

    #[test]
    fn large_integers_compare_exactly() {
        let c = Constraint::atomic("count", Operator::Eq, 9_007_199_254_740_992_u64);
        let e = ConstraintEvaluator::new();
        let r = req().with_operand("count", 9_007_199_254_740_993_u64);
        assert_eq!(e.evaluate(&c, &r), Outcome::Violated);
        let lt = Constraint::atomic("count", Operator::Lt, 9_007_199_254_740_993_u64);
        let at = req().with_operand("count", 9_007_199_254_740_992_u64);
        assert_eq!(e.evaluate(&lt, &at), Outcome::Satisfied);
    }

    #[test]
    fn eq_on_mismatched_types_is_violated() {
        let c = Constraint::atomic("count", Operator::Eq, 5);
        let e = ConstraintEvaluator::new();
        assert_eq!(e.evaluate(&c, &req().with_operand("count", "5")), Outcome::Violated);
        let typed: Constraint = AtomicConstraint::new("count", Operator::Eq, 5)
            .data_type("xsd:integer")
            .into();
        assert_eq!(e.evaluate(&typed, &req().with_operand("count", "5")), Outcome::Satisfied);
    }

    #[test]
    fn date_time_comparison_uses_request_instant() {
        use chrono::{TimeZone, Utc};
        let c: Constraint = AtomicConstraint::new("dateTime", Operator::Lt, "2027-01-01T00:00:00Z")
            .data_type("xsd:dateTime")
            .into();
        let e = ConstraintEvaluator::new();
        let before = req().at(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
        let after = req().at(Utc.with_ymd_and_hms(2027, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(e.evaluate(&c, &before), Outcome::Satisfied);
        assert_eq!(e.evaluate(&c, &after), Outcome::Violated);
    }

    #[test]
    fn unit_mismatch_is_indeterminate() {
        let c: Constraint = AtomicConstraint::new("payAmount", Operator::Gteq, 10)
            .unit("EUR")
            .into();
        let e = ConstraintEvaluator::new();
        assert_eq!(
            e.evaluate(&c, &req().with_measured_operand("payAmount", 12, "EUR")),
            Outcome::Satisfied
        );
        assert_eq!(
            e.evaluate(&c, &req().with_measured_operand("payAmount", 12, "USD")),
            Outcome::Indeterminate
        );
        // An unmeasured value is compared as-is.
        assert_eq!(e.evaluate(&c, &req().with_operand("payAmount", 12)), Outcome::Satisfied);
    }

    #[test]
    fn set_operators() {
        let e = ConstraintEvaluator::new();
        let r = req().with_operand("spatial", json!(["DE", "FR"]));
        let any = Constraint::atomic("spatial", Operator::IsAnyOf, json!(["FR", "IT"]));
        let all = Constraint::atomic("spatial", Operator::IsAllOf, json!(["DE", "FR"]));
        let none = Constraint::atomic("spatial", Operator::IsNoneOf, json!(["IT"]));
        assert_eq!(e.evaluate(&any, &r), Outcome::Satisfied);
        assert_eq!(e.evaluate(&all, &r), Outcome::Satisfied);
        assert_eq!(e.evaluate(&none, &r), Outcome::Satisfied);

        let scalar = req().with_operand("spatial", "IT");
        assert_eq!(e.evaluate(&any, &scalar), Outcome::Satisfied);
        assert_eq!(e.evaluate(&all, &scalar), Outcome::Violated);
        assert_eq!(e.evaluate(&none, &scalar), Outcome::Violated);
    }

    #[test]
    fn composites() {
        let e = ConstraintEvaluator::new();
        let r = req().with_operand("a", 1).with_operand("b", 1).with_operand("c", 2);
        let unknown = sat("zzz");

        assert_eq!(e.evaluate(&Constraint::and(vec![sat("a"), sat("b")]), &r), Outcome::Satisfied);
        assert_eq!(e.evaluate(&Constraint::and(vec![sat("a"), sat("c")]), &r), Outcome::Violated);
        assert_eq!(
            e.evaluate(&Constraint::and(vec![sat("a"), unknown.clone()]), &r),
            Outcome::Indeterminate
        );
        assert_eq!(
            e.evaluate(&Constraint::or(vec![sat("c"), unknown.clone()]), &r),
            Outcome::Indeterminate
        );
        assert_eq!(e.evaluate(&Constraint::or(vec![sat("c"), sat("a")]), &r), Outcome::Satisfied);
        assert_eq!(e.evaluate(&Constraint::xone(vec![sat("a"), sat("c")]), &r), Outcome::Satisfied);
        assert_eq!(e.evaluate(&Constraint::xone(vec![sat("a"), sat("b")]), &r), Outcome::Violated);
    }

    #[test]
    fn and_sequence_short_circuits_on_violation() {
        let e = ConstraintEvaluator::new();
        let r = req().with_operand("a", 1).with_operand("c", 2);
        // Violated before the unknown member is reached.
        let c = Constraint::and_sequence(vec![sat("c"), sat("zzz")]);
        assert_eq!(e.evaluate(&c, &r), Outcome::Violated);
        let c = Constraint::and_sequence(vec![sat("zzz"), sat("c")]);
        assert_eq!(e.evaluate(&c, &r), Outcome::Violated);
        let c = Constraint::and_sequence(vec![sat("a"), sat("zzz")]);
        assert_eq!(e.evaluate(&c, &r), Outcome::Indeterminate);
    }

    #[test]
    fn empty_composite_is_indeterminate() {
        let e = ConstraintEvaluator::new();
        assert_eq!(e.evaluate(&Constraint::and(vec![]), &req()), Outcome::Indeterminate);
        assert_eq!(e.evaluate(&Constraint::xone(vec![]), &req()), Outcome::Indeterminate);
    }

    #[test]
    fn evaluate_all_of_nothing_is_satisfied() {
        assert_eq!(ConstraintEvaluator::new().evaluate_all(&[], &req()), Outcome::Satisfied);
    }

    #[derive(Debug)]
    struct Within;

    impl OperatorEvaluator for Within {
        fn evaluate(&self, left: &OperandValue, right: &Value, _c: &AtomicConstraint) -> Outcome {
            match (left.value.as_f64(), right.as_f64()) {
                (Some(l), Some(r)) => Outcome::from_bool(l.abs() <= r),
                _ => Outcome::Indeterminate,
            }
        }
    }

    #[derive(Debug)]
    struct Majority;

    impl LogicalEvaluator for Majority {
        fn combine(&self, outcomes: &[Outcome]) -> Outcome {
            let yes = outcomes.iter().filter(|o| o.is_satisfied()).count();
            Outcome::from_bool(yes * 2 > outcomes.len())
        }
    }

    #[test]
    fn custom_terms_need_registration() {
        let within = Constraint::atomic("offset", Operator::Custom("ex:within".into()), 3);
        let majority = Constraint::composite(
            LogicalOperator::Custom("ex:majority".into()),
            vec![sat("a"), sat("a"), sat("c")],
        );
        let r = req().with_operand("offset", -2).with_operand("a", 1).with_operand("c", 2);

        let bare = ConstraintEvaluator::new();
        assert_eq!(bare.evaluate(&within, &r), Outcome::Indeterminate);
        assert_eq!(bare.evaluate(&majority, &r), Outcome::Indeterminate);

        let registry = ProfileRegistry::new()
            .with_operator("ex:within", Within)
            .with_logical("ex:majority", Majority);
        let extended = ConstraintEvaluator::new().with_registry(&registry);
        assert_eq!(extended.evaluate(&within, &r), Outcome::Satisfied);
        assert_eq!(extended.evaluate(&majority, &r), Outcome::Satisfied);
    }

    #[test]
    fn json_ld_typed_literal() {
        let c = Constraint::atomic(
            "payAmount",
            Operator::Lteq,
            json!({"@value": "10.00", "@type": "xsd:decimal"}),
        );
        let e = ConstraintEvaluator::new();
        assert_eq!(e.evaluate(&c, &req().with_operand("payAmount", 9.5)), Outcome::Satisfied);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_atomic() -> impl Strategy<Value = Constraint> {
        (
            prop::sample::select(vec!["a", "b", "c"]),
            prop::sample::select(vec![
                Operator::Eq,
                Operator::Neq,
                Operator::Lt,
                Operator::Gteq,
            ]),
            0i64..4,
        )
            .prop_map(|(name, op, right)| Constraint::atomic(name, op, right))
    }

    fn arb_constraint() -> impl Strategy<Value = Constraint> {
        arb_atomic().prop_recursive(4, 32, 4, |inner| {
            (
                prop::sample::select(vec![
                    LogicalOperator::And,
                    LogicalOperator::Or,
                    LogicalOperator::Xone,
                    LogicalOperator::AndSequence,
                ]),
                prop::collection::vec(inner, 1..4),
            )
                .prop_map(|(op, members)| Constraint::composite(op, members))
        })
    }

    fn arb_request() -> impl Strategy<Value = Request> {
        (0i64..4, 0i64..4, 0i64..4).prop_map(|(a, b, c)| {
            Request::new("use", "p", "t")
                .with_operand("a", a)
                .with_operand("b", b)
                .with_operand("c", c)
        })
    }

    proptest! {
        #[test]
        fn evaluation_is_deterministic(c in arb_constraint(), r in arb_request()) {
            let e = ConstraintEvaluator::new();
            prop_assert_eq!(e.evaluate(&c, &r), e.evaluate(&c, &r));
        }

        #[test]
        fn fully_resolved_context_is_never_indeterminate(
            c in arb_constraint(),
            r in arb_request(),
        ) {
            // Every operand resolves to an integer and every operator is
            // core, so each composite row decides.
            prop_assert_ne!(ConstraintEvaluator::new().evaluate(&c, &r), Outcome::Indeterminate);
        }

        #[test]
        fn xone_with_decided_members(outcomes in prop::collection::vec(any::<bool>(), 1..8)) {
            let members: Vec<Constraint> = outcomes
                .iter()
                .map(|&holds| Constraint::atomic("a", Operator::Eq, if holds { 1 } else { 0 }))
                .collect();
            let r = Request::new("use", "p", "t").with_operand("a", 1);
            let satisfied = outcomes.iter().filter(|&&h| h).count();
            let expected = if satisfied == 1 { Outcome::Satisfied } else { Outcome::Violated };
            prop_assert_eq!(
                ConstraintEvaluator::new().evaluate(&Constraint::xone(members), &r),
                expected
            );
        }
    }
}
