//! # odrl-decision — Decisions and Duties
//!
//! Answers requests against a [`ValidatedPolicy`](odrl_policy::ValidatedPolicy)
//! and tracks the duties those answers trigger.
//!
//! - [`DecisionEngine`]: rule matching, conflict resolution, and duty
//!   surfacing. Pure and reentrant.
//! - [`DutyLedger`]: caller-owned fulfillment state machine. The engine
//!   reads it through [`DutyStatusView`] and never writes it.
//!
//! ## Usage
//!
//! ```
//! use odrl_core::{EngineConfig, Permission, Policy, Request, Rule};
//! use odrl_decision::{Decision, DecisionEngine};
//! use odrl_policy::compile;
//!
//! let config = EngineConfig::default();
//! let policy = Policy::default().with_permission(Permission::new(Rule::new("use")));
//! let validated = compile(&policy, &config).unwrap();
//!
//! let engine = DecisionEngine::new(&config);
//! let verdict = engine.decide(&validated, &Request::new("print", "urn:party:bob", "urn:asset:1"));
//! assert_eq!(verdict.decision, Decision::Permitted);
//! ```

pub mod engine;
pub mod ledger;
pub mod verdict;

pub use engine::DecisionEngine;
pub use ledger::{
    DutyError, DutyLedger, DutyRecord, DutyState, DutyStatusView, Fulfillment, NoDuties,
    SharedDutyLedger,
};
pub use verdict::{Decision, DutyKey, DutyOrigin, TriggeredDuty, Verdict};
