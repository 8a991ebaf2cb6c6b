//! # Profile Registry
//!
//! ODRL profiles may define operators and logical combinators beyond the
//! core vocabulary. The model carries them as `Operator::Custom` and
//! `LogicalOperator::Custom`; they evaluate `Indeterminate` unless an
//! evaluator is registered here under the same term.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use odrl_core::{AtomicConstraint, OperandValue};

use crate::outcome::Outcome;

/// Evaluates a profile-defined relational operator.
pub trait OperatorEvaluator: Send + Sync + fmt::Debug {
    /// Compare the resolved left value with the resolved right value.
    fn evaluate(
        &self,
        left: &OperandValue,
        right: &Value,
        constraint: &AtomicConstraint,
    ) -> Outcome;
}

/// Combines member outcomes for a profile-defined logical operator.
pub trait LogicalEvaluator: Send + Sync + fmt::Debug {
    /// Combine member outcomes, given in declared order.
    fn combine(&self, outcomes: &[Outcome]) -> Outcome;
}

/// Registered profile extensions, keyed by term as written in the policy.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    operators: BTreeMap<String, Box<dyn OperatorEvaluator>>,
    logical: BTreeMap<String, Box<dyn LogicalEvaluator>>,
}

impl ProfileRegistry {
    /// A registry with no extensions.
    pub const fn new() -> Self {
        Self {
            operators: BTreeMap::new(),
            logical: BTreeMap::new(),
        }
    }

    /// Builder: register an operator evaluator.
    pub fn with_operator(
        mut self,
        term: impl Into<String>,
        evaluator: impl OperatorEvaluator + 'static,
    ) -> Self {
        self.register_operator(term, evaluator);
        self
    }

    /// Builder: register a logical combinator.
    pub fn with_logical(
        mut self,
        term: impl Into<String>,
        evaluator: impl LogicalEvaluator + 'static,
    ) -> Self {
        self.register_logical(term, evaluator);
        self
    }

    /// Register an operator evaluator, replacing any previous one.
    pub fn register_operator(
        &mut self,
        term: impl Into<String>,
        evaluator: impl OperatorEvaluator + 'static,
    ) {
        let term = term.into();
        tracing::debug!(term = %term, "registered profile operator");
        self.operators.insert(term, Box::new(evaluator));
    }

    /// Register a logical combinator, replacing any previous one.
    pub fn register_logical(
        &mut self,
        term: impl Into<String>,
        evaluator: impl LogicalEvaluator + 'static,
    ) {
        let term = term.into();
        tracing::debug!(term = %term, "registered profile combinator");
        self.logical.insert(term, Box::new(evaluator));
    }

    /// The evaluator for `term`, if registered.
    pub fn operator(&self, term: &str) -> Option<&dyn OperatorEvaluator> {
        self.operators.get(term).map(|e| &**e)
    }

    /// The combinator for `term`, if registered.
    pub fn logical(&self, term: &str) -> Option<&dyn LogicalEvaluator> {
        self.logical.get(term).map(|e| &**e)
    }
}
