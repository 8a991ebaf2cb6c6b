//! # odrl-constraint — Tri-State Constraint Evaluation
//!
//! Evaluates ODRL constraints against a request and returns one of
//! `Satisfied`, `Violated` or `Indeterminate`.
//!
//! ## Architecture
//!
//! - **Outcome** ([`outcome`]): the tri-state lattice and its `and`, `or`
//!   and `xone` folds.
//! - **Coercion** ([`value`]): dataType-aware conversion of JSON operands
//!   into comparable values.
//! - **Collaborators** ([`context`]): left-operand supply and
//!   right-operand dereference, injected by the caller.
//! - **Registry** ([`registry`]): evaluators for profile-defined operators
//!   and logical combinators.
//! - **Evaluator** ([`evaluator`]): ties the above together.
//! - **Prefetch** (`prefetch`, feature `async`): resolves references
//!   asynchronously ahead of evaluation, with a per-IRI timeout.
//!
//! ## Crate Policy
//!
//! - Depends only on `odrl-core` internally.
//! - Evaluation never panics and never returns an error: unresolvable
//!   input is `Indeterminate`.

pub mod context;
pub mod evaluator;
pub mod outcome;
#[cfg(feature = "async")]
pub mod prefetch;
pub mod registry;
pub mod value;

pub use context::{
    ContextSupplier, Lookup, NoReferences, OperandResolver, RequestOperands, Resolution,
    StaticReferences,
};
pub use evaluator::ConstraintEvaluator;
pub use outcome::Outcome;
#[cfg(feature = "async")]
pub use prefetch::{prefetch_references, reference_iris, AsyncOperandResolver, ResolvedReferences};
pub use registry::{LogicalEvaluator, OperatorEvaluator, ProfileRegistry};
pub use value::{Numeric, TypedValue};
