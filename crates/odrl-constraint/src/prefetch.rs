//! # Asynchronous Reference Prefetch
//!
//! Dereferencing a `rightOperandReference` may need I/O. Evaluation is
//! synchronous, so references are fetched ahead of time: every distinct
//! IRI in a set of constraints is resolved under a per-IRI timeout, and
//! the results are frozen into a [`ResolvedReferences`] snapshot that the
//! evaluator then reads synchronously.
//!
//! IRIs are resolved concurrently on the calling task, so the whole
//! prefetch takes about one timeout at worst regardless of how many
//! references a policy carries.
//!
//! A reference that fails or times out is recorded as unavailable, which
//! the evaluator turns into `Indeterminate`.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;

use odrl_core::Constraint;

use crate::context::{OperandResolver, Resolution};

/// Dereferences right-operand IRIs asynchronously.
pub trait AsyncOperandResolver: Send + Sync {
    /// Dereference `iri`.
    fn resolve(&self, iri: &str) -> impl Future<Output = Resolution> + Send;
}

/// Snapshot of prefetched references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedReferences {
    values: BTreeMap<String, Value>,
    unavailable: BTreeSet<String>,
}

impl ResolvedReferences {
    /// IRIs that could not be dereferenced or timed out.
    pub fn unavailable(&self) -> impl Iterator<Item = &str> {
        self.unavailable.iter().map(String::as_str)
    }

    /// Number of IRIs that resolved to a value.
    pub fn resolved_count(&self) -> usize {
        self.values.len()
    }
}

impl OperandResolver for ResolvedReferences {
    fn resolve(&self, iri: &str) -> Resolution {
        match self.values.get(iri) {
            Some(v) => Resolution::Value(v.clone()),
            None => Resolution::Unavailable,
        }
    }
}

/// Distinct `rightOperandReference` IRIs in `constraints`, including
/// nested members, in sorted order.
pub fn reference_iris<'c>(
    constraints: impl IntoIterator<Item = &'c Constraint>,
) -> BTreeSet<String> {
    let mut iris = BTreeSet::new();
    for constraint in constraints {
        constraint.walk(&mut |node| {
            if let Constraint::Atomic(a) = node {
                if let Some(iri) = &a.right_operand_reference {
                    iris.insert(iri.clone());
                }
            }
        });
    }
    iris
}

/// Resolve every distinct reference IRI in `constraints` concurrently,
/// each under `timeout`.
pub async fn prefetch_references<'c, R>(
    constraints: impl IntoIterator<Item = &'c Constraint>,
    resolver: &R,
    timeout: Duration,
) -> ResolvedReferences
where
    R: AsyncOperandResolver,
{
    let lookups = reference_iris(constraints).into_iter().map(|iri| async move {
        let outcome = tokio::time::timeout(timeout, resolver.resolve(&iri)).await;
        (iri, outcome)
    });

    let mut snapshot = ResolvedReferences::default();
    for (iri, outcome) in join_all(lookups).await {
        match outcome {
            Ok(Resolution::Value(v)) => {
                snapshot.values.insert(iri, v);
            }
            Ok(Resolution::Unavailable) => {
                tracing::debug!(iri = %iri, "operand reference unavailable");
                snapshot.unavailable.insert(iri);
            }
            Err(_) => {
                tracing::warn!(
                    iri = %iri,
                    timeout_ms = timeout.as_millis() as u64,
                    "operand reference timed out"
                );
                snapshot.unavailable.insert(iri);
            }
        }
    }
    snapshot
}
