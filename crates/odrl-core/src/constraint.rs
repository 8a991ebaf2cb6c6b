//! # Constraints
//!
//! A constraint is a binary tree node: either an [`AtomicConstraint`]
//! comparing a left operand to a right operand, or a
//! [`CompositeConstraint`] combining nested constraints with a logical
//! operator.
//!
//! Operators and combinators are open: ODRL profiles may define their own,
//! which are carried as `Custom` and evaluated only when a profile
//! evaluator is registered.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::vocab::local_name;

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

/// Relational operator of an atomic constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    /// Equal to.
    Eq,
    /// Not equal to.
    Neq,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gteq,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lteq,
    /// Left value shares at least one member with the right set.
    IsAnyOf,
    /// Left value contains every member of the right set.
    IsAllOf,
    /// Left value shares no member with the right set.
    IsNoneOf,
    /// Profile-defined operator, kept by its full name.
    Custom(String),
}

impl Operator {
    /// The ODRL term for this operator.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gteq => "gteq",
            Self::Lt => "lt",
            Self::Lteq => "lteq",
            Self::IsAnyOf => "isAnyOf",
            Self::IsAllOf => "isAllOf",
            Self::IsNoneOf => "isNoneOf",
            Self::Custom(name) => name,
        }
    }

    /// Whether this operator requires ordinally comparable operands.
    pub fn is_ordinal(&self) -> bool {
        matches!(self, Self::Gt | Self::Gteq | Self::Lt | Self::Lteq)
    }
}

impl From<&str> for Operator {
    fn from(term: &str) -> Self {
        match local_name(term) {
            "eq" => Self::Eq,
            "neq" => Self::Neq,
            "gt" => Self::Gt,
            "gteq" => Self::Gteq,
            "lt" => Self::Lt,
            "lteq" => Self::Lteq,
            "isAnyOf" => Self::IsAnyOf,
            "isAllOf" => Self::IsAllOf,
            "isNoneOf" => Self::IsNoneOf,
            _ => Self::Custom(term.to_string()),
        }
    }
}

impl From<String> for Operator {
    fn from(term: String) -> Self {
        Self::from(term.as_str())
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LogicalOperator
// ---------------------------------------------------------------------------

/// Combinator of a composite constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogicalOperator {
    /// All members must hold.
    And,
    /// At least one member must hold.
    Or,
    /// Exactly one member must hold.
    Xone,
    /// All members must hold, evaluated in declared order.
    AndSequence,
    /// Profile-defined combinator, kept by its full name.
    Custom(String),
}

impl LogicalOperator {
    /// The ODRL term for this combinator.
    pub fn as_str(&self) -> &str {
        match self {
            Self::And => "and",
            Self::Or => "or",
            Self::Xone => "xone",
            Self::AndSequence => "andSequence",
            Self::Custom(name) => name,
        }
    }
}

impl From<&str> for LogicalOperator {
    fn from(term: &str) -> Self {
        match local_name(term) {
            "and" => Self::And,
            "or" => Self::Or,
            "xone" => Self::Xone,
            "andSequence" => Self::AndSequence,
            _ => Self::Custom(term.to_string()),
        }
    }
}

impl From<String> for LogicalOperator {
    fn from(term: String) -> Self {
        Self::from(term.as_str())
    }
}

impl From<LogicalOperator> for String {
    fn from(op: LogicalOperator) -> Self {
        match op {
            LogicalOperator::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AtomicConstraint
// ---------------------------------------------------------------------------

/// Which right-operand forms an atomic constraint declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandForm {
    /// Only `rightOperand`.
    Literal,
    /// Only `rightOperandReference`.
    Reference,
    /// Both forms (malformed).
    Both,
    /// Neither form (malformed).
    Neither,
}

/// A leaf constraint: `leftOperand operator rightOperand`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicConstraint {
    /// Optional identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Name of the left operand, e.g. `count` or `dateTime`.
    pub left_operand: String,
    /// Relational operator.
    pub operator: Operator,
    /// Literal right operand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_operand: Option<Value>,
    /// IRI to dereference for the right operand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_operand_reference: Option<String>,
    /// Data type of the operands, e.g. `xsd:dateTime`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    /// Unit of measurement of the right operand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Runtime value of the left operand recorded on the constraint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl AtomicConstraint {
    /// A constraint with a literal right operand.
    pub fn new(
        left_operand: impl Into<String>,
        operator: Operator,
        right: impl Into<Value>,
    ) -> Self {
        Self {
            uid: None,
            left_operand: left_operand.into(),
            operator,
            right_operand: Some(right.into()),
            right_operand_reference: None,
            data_type: None,
            unit: None,
            status: None,
        }
    }

    /// A constraint whose right operand is obtained by dereferencing `iri`.
    pub fn with_reference(
        left_operand: impl Into<String>,
        operator: Operator,
        iri: impl Into<String>,
    ) -> Self {
        Self {
            uid: None,
            left_operand: left_operand.into(),
            operator,
            right_operand: None,
            right_operand_reference: Some(iri.into()),
            data_type: None,
            unit: None,
            status: None,
        }
    }

    /// Builder: set the data type.
    pub fn data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Builder: set the unit.
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Builder: set the status value.
    pub fn status(mut self, status: impl Into<Value>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Which right-operand forms are present.
    pub fn operand_form(&self) -> OperandForm {
        match (&self.right_operand, &self.right_operand_reference) {
            (Some(_), None) => OperandForm::Literal,
            (None, Some(_)) => OperandForm::Reference,
            (Some(_), Some(_)) => OperandForm::Both,
            (None, None) => OperandForm::Neither,
        }
    }
}

// ---------------------------------------------------------------------------
// CompositeConstraint
// ---------------------------------------------------------------------------

/// A logical combination of nested constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeConstraint {
    /// Optional identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// The combinator.
    pub operator: LogicalOperator,
    /// Members in declared order.
    pub constraints: Vec<Constraint>,
}

// ---------------------------------------------------------------------------
// Constraint
// ---------------------------------------------------------------------------

/// An atomic or composite constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Leaf comparison.
    Atomic(AtomicConstraint),
    /// Logical combination.
    Composite(CompositeConstraint),
}

impl Constraint {
    /// Atomic constraint with a literal right operand.
    pub fn atomic(left_operand: &str, operator: Operator, right: impl Into<Value>) -> Self {
        Self::Atomic(AtomicConstraint::new(left_operand, operator, right))
    }

    /// Composite with an arbitrary combinator.
    pub fn composite(operator: LogicalOperator, constraints: Vec<Constraint>) -> Self {
        Self::Composite(CompositeConstraint {
            uid: None,
            operator,
            constraints,
        })
    }

    /// `and` composite.
    pub fn and(constraints: Vec<Constraint>) -> Self {
        Self::composite(LogicalOperator::And, constraints)
    }

    /// `or` composite.
    pub fn or(constraints: Vec<Constraint>) -> Self {
        Self::composite(LogicalOperator::Or, constraints)
    }

    /// `xone` composite.
    pub fn xone(constraints: Vec<Constraint>) -> Self {
        Self::composite(LogicalOperator::Xone, constraints)
    }

    /// `andSequence` composite.
    pub fn and_sequence(constraints: Vec<Constraint>) -> Self {
        Self::composite(LogicalOperator::AndSequence, constraints)
    }

    /// Optional identifier of either variant.
    pub fn uid(&self) -> Option<&str> {
        match self {
            Self::Atomic(a) => a.uid.as_deref(),
            Self::Composite(c) => c.uid.as_deref(),
        }
    }

    /// Visit this constraint and every nested constraint, parents first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Constraint)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            visit(node);
            if let Self::Composite(c) = node {
                stack.extend(c.constraints.iter().rev());
            }
        }
    }
}

impl From<AtomicConstraint> for Constraint {
    fn from(a: AtomicConstraint) -> Self {
        Self::Atomic(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operator_parses_odrl_terms() {
        assert_eq!(Operator::from("lteq"), Operator::Lteq);
        assert_eq!(Operator::from("odrl:isAnyOf"), Operator::IsAnyOf);
        assert_eq!(
            Operator::from("ex:within"),
            Operator::Custom("ex:within".into())
        );
        assert!(Operator::Gt.is_ordinal());
        assert!(!Operator::Eq.is_ordinal());
    }

    #[test]
    fn logical_operator_parses_odrl_terms() {
        assert_eq!(LogicalOperator::from("andSequence"), LogicalOperator::AndSequence);
        assert_eq!(
            LogicalOperator::from("ex:majority"),
            LogicalOperator::Custom("ex:majority".into())
        );
    }

    #[test]
    fn operand_form_detection() {
        let literal = AtomicConstraint::new("count", Operator::Lteq, 5);
        assert_eq!(literal.operand_form(), OperandForm::Literal);

        let reference = AtomicConstraint::with_reference("count", Operator::Lteq, "http://x/limit");
        assert_eq!(reference.operand_form(), OperandForm::Reference);

        let mut both = literal.clone();
        both.right_operand_reference = Some("http://x/limit".into());
        assert_eq!(both.operand_form(), OperandForm::Both);

        let mut neither = literal;
        neither.right_operand = None;
        assert_eq!(neither.operand_form(), OperandForm::Neither);
    }

    #[test]
    fn walk_visits_in_document_order() {
        let c = Constraint::and(vec![
            Constraint::atomic("a", Operator::Eq, 1),
            Constraint::or(vec![Constraint::atomic("b", Operator::Eq, 2)]),
            Constraint::atomic("c", Operator::Eq, 3),
        ]);
        let mut seen = Vec::new();
        c.walk(&mut |node| {
            if let Constraint::Atomic(a) = node {
                seen.push(a.left_operand.clone());
            }
        });
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn custom_operator_serializes_as_name() {
        let c = AtomicConstraint::new("x", Operator::Custom("ex:near".into()), json!(1));
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["operator"], "ex:near");
        let back: AtomicConstraint = serde_json::from_value(json).unwrap();
        assert_eq!(back, c);
    }
}
