//! # Structural Violations
//!
//! A violation names where in the policy a structural invariant failed and
//! which invariant it was. The validator in `odrl-policy` produces them;
//! they live here so that [`StructuralError`](crate::StructuralError) can
//! carry them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The structural invariant a violation breaks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    /// An atomic constraint declares both `rightOperand` and
    /// `rightOperandReference`.
    BothOperandForms,
    /// An atomic constraint declares neither operand form.
    MissingOperand,
    /// A composite constraint has no nested constraints.
    EmptyComposite,
    /// A rule has no action, neither its own nor an inherited one.
    MissingAction,
    /// A fallback duty sits deeper than the configured cap.
    FallbackDepthExceeded {
        /// Depth of the rule.
        depth: usize,
        /// The configured maximum.
        max: usize,
    },
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BothOperandForms => {
                f.write_str("both rightOperand and rightOperandReference are present")
            }
            Self::MissingOperand => {
                f.write_str("neither rightOperand nor rightOperandReference is present")
            }
            Self::EmptyComposite => f.write_str("composite constraint has no members"),
            Self::MissingAction => f.write_str("rule has no action"),
            Self::FallbackDepthExceeded { depth, max } => {
                write!(f, "fallback depth {depth} exceeds maximum {max}")
            }
        }
    }
}

/// A single validation violation with its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Path to the offending element, e.g. `permission[0].constraint[1].and[0]`.
    pub path: String,
    /// The invariant that failed.
    pub kind: ViolationKind,
}

impl Violation {
    /// Create a violation at `path`.
    pub fn new(path: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  {}: {}", self.path, self.kind)
    }
}

/// Collection of validation violations, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violations {
    violations: Vec<Violation>,
}

impl Violations {
    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Append a violation.
    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Whether any violation has the given kind.
    pub fn contains_kind(&self, kind: &ViolationKind) -> bool {
        self.violations.iter().any(|v| &v.kind == kind)
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl From<Vec<Violation>> for Violations {
    fn from(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}
