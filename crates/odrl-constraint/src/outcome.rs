//! # Evaluation Outcome
//!
//! Tri-state result of evaluating a constraint.
//!
//! ```text
//! Ordering (worst → best): Violated < Indeterminate < Satisfied
//!
//! meet(a, b) = min(a, b)    used by `and`
//! join(a, b) = max(a, b)    used by `or`
//! ```
//!
//! `Violated` is absorbing under `meet` and `Satisfied` under `join`, so
//! missing data (`Indeterminate`) never masks a definite answer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of evaluating a constraint against a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The constraint holds.
    Satisfied,
    /// The constraint does not hold.
    Violated,
    /// The constraint cannot be decided: an operand is missing, a
    /// reference could not be dereferenced, the operands are not
    /// comparable, or the operator is unknown.
    Indeterminate,
}

impl Outcome {
    fn ordering(self) -> u8 {
        match self {
            Self::Violated => 0,
            Self::Indeterminate => 1,
            Self::Satisfied => 2,
        }
    }

    /// Pessimistic composition.
    pub fn meet(self, other: Self) -> Self {
        if self.ordering() <= other.ordering() {
            self
        } else {
            other
        }
    }

    /// Optimistic composition.
    pub fn join(self, other: Self) -> Self {
        if self.ordering() >= other.ordering() {
            self
        } else {
            other
        }
    }

    /// Boolean to outcome.
    pub fn from_bool(holds: bool) -> Self {
        if holds {
            Self::Satisfied
        } else {
            Self::Violated
        }
    }

    /// Swap `Satisfied` and `Violated`; `Indeterminate` stays.
    pub fn negate(self) -> Self {
        match self {
            Self::Satisfied => Self::Violated,
            Self::Violated => Self::Satisfied,
            Self::Indeterminate => Self::Indeterminate,
        }
    }

    /// Whether the outcome is `Satisfied`.
    pub fn is_satisfied(self) -> bool {
        self == Self::Satisfied
    }

    /// Whether the outcome is `Indeterminate`.
    pub fn is_indeterminate(self) -> bool {
        self == Self::Indeterminate
    }

    /// `and` over a sequence. Empty input is `Indeterminate`.
    pub fn all(outcomes: impl IntoIterator<Item = Self>) -> Self {
        outcomes
            .into_iter()
            .reduce(Self::meet)
            .unwrap_or(Self::Indeterminate)
    }

    /// `or` over a sequence. Empty input is `Indeterminate`.
    pub fn any(outcomes: impl IntoIterator<Item = Self>) -> Self {
        outcomes
            .into_iter()
            .reduce(Self::join)
            .unwrap_or(Self::Indeterminate)
    }

    /// `xone` over a sequence.
    ///
    /// Two or more `Satisfied` is `Violated` regardless of the rest. Exactly
    /// one `Satisfied` with no `Indeterminate` is `Satisfied`; none
    /// `Satisfied` and none `Indeterminate` is `Violated`. Anything else,
    /// and empty input, is `Indeterminate`.
    pub fn exactly_one(outcomes: impl IntoIterator<Item = Self>) -> Self {
        let (mut seen, mut satisfied, mut indeterminate) = (0usize, 0usize, 0usize);
        for outcome in outcomes {
            seen += 1;
            match outcome {
                Self::Satisfied => satisfied += 1,
                Self::Indeterminate => indeterminate += 1,
                Self::Violated => {}
            }
        }
        match (seen, satisfied, indeterminate) {
            (0, _, _) => Self::Indeterminate,
            (_, s, _) if s >= 2 => Self::Violated,
            (_, 1, 0) => Self::Satisfied,
            (_, 0, 0) => Self::Violated,
            _ => Self::Indeterminate,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied => f.write_str("satisfied"),
            Self::Violated => f.write_str("violated"),
            Self::Indeterminate => f.write_str("indeterminate"),
        }
    }
}
