//! # odrl-core — Foundational Types for the ODRL Policy Engine
//!
//! This crate is the leaf of the workspace DAG. It defines the policy model
//! (Policy, Permission, Prohibition, Duty, Action, Constraint), ingestion of
//! ODRL JSON documents into that model, the request context the engine
//! decides over, engine configuration, and the error taxonomy shared by
//! every other crate.
//!
//! ## Key Design Principles
//!
//! 1. **Open variants, not strings.** Operators, logical combinators, policy
//!    types and conflict strategies are enums with a `Custom`/`Other` escape
//!    hatch. Profile extensions stay representable without falling back to
//!    untyped maps.
//!
//! 2. **Sequences everywhere.** ODRL allows `string | string[]` for parties
//!    and targets and `Rule | Rule[]` for rule groups. The model always holds
//!    sequences; ingestion absorbs the asymmetry once.
//!
//! 3. **Structural errors are values with context.** Every ingestion and
//!    structural failure carries the document path that caused it.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `odrl-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod config;
pub mod constraint;
pub mod document;
pub mod error;
pub mod policy;
pub mod request;
pub mod rule;
pub mod violation;
pub mod vocab;

// Re-export primary types for ergonomic imports.
pub use config::{ActionHierarchy, EngineConfig};
pub use document::DocumentReader;
pub use constraint::{
    AtomicConstraint, CompositeConstraint, Constraint, LogicalOperator, OperandForm, Operator,
};
pub use error::{ConfigError, DocumentError, OdrlError, StructuralError};
pub use policy::{ConflictStrategy, Policy, PolicyType};
pub use request::{OperandValue, Request};
pub use rule::{Action, Duty, Permission, Prohibition, Rule};
pub use violation::{Violation, ViolationKind, Violations};
