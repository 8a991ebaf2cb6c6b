//! # odrl-policy — Normalization and Validation
//!
//! Turns a [`Policy`](odrl_core::Policy) as written into a
//! [`ValidatedPolicy`] the decision engine can consume.
//!
//! ```text
//! Policy ──normalize──▶ NormalizedPolicy ──check──▶ ValidatedPolicy
//! ```
//!
//! - [`normalize`]: resolves compact notation eagerly into an index arena
//!   with bounded fallback depth.
//! - [`validate`]: collects structural violations with document paths.
//! - [`check`]: the only constructor of [`ValidatedPolicy`].
//!
//! Both steps are pure functions of their inputs.

pub mod normalize;
pub mod validate;

pub use normalize::{normalize, NormalizedPolicy, NormalizedRule, RuleIndex, RuleRole, SharedFields};
pub use validate::{check, compile, validate, ValidatedPolicy};
