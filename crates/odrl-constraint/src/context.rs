//! # Operand Collaborators
//!
//! The evaluator never fetches data itself. Left-operand values come from
//! a [`ContextSupplier`]; `rightOperandReference` IRIs are dereferenced by
//! an [`OperandResolver`]. Both are injected so that evaluation stays pure
//! with respect to its inputs.

use std::collections::BTreeMap;

use serde_json::Value;

use odrl_core::vocab::local_name;
use odrl_core::{OperandValue, Request};

/// Result of looking up a left operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The operand's current value.
    Found(OperandValue),
    /// The supplier has no value for this operand.
    Unknown,
}

/// Supplies the current value of a left operand for a request.
pub trait ContextSupplier: Send + Sync {
    /// Look up `name` in the context of `request`.
    fn lookup(&self, name: &str, request: &Request) -> Lookup;
}

/// Result of dereferencing a `rightOperandReference`.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The referenced value.
    Value(Value),
    /// The reference could not be dereferenced.
    Unavailable,
}

/// Dereferences right-operand IRIs.
pub trait OperandResolver: Send + Sync {
    /// Dereference `iri`.
    fn resolve(&self, iri: &str) -> Resolution;
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Reads left operands from the request's operand map.
///
/// Names are tried as written, then by ODRL local name, so a constraint on
/// `odrl:count` finds a request operand named `count`. The `dateTime`
/// operand falls back to the request instant.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestOperands;

impl ContextSupplier for RequestOperands {
    fn lookup(&self, name: &str, request: &Request) -> Lookup {
        let local = local_name(name);
        if let Some(v) = request.operand(name).or_else(|| request.operand(local)) {
            return Lookup::Found(v.clone());
        }
        match (local, request.at) {
            ("dateTime", Some(at)) => {
                Lookup::Found(OperandValue::from(Value::String(at.to_rfc3339())))
            }
            _ => Lookup::Unknown,
        }
    }
}

/// A resolver that cannot dereference anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

impl OperandResolver for NoReferences {
    fn resolve(&self, _iri: &str) -> Resolution {
        Resolution::Unavailable
    }
}

/// A resolver backed by a fixed IRI → value map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticReferences {
    values: BTreeMap<String, Value>,
}

impl StaticReferences {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: bind `iri` to `value`.
    pub fn with(mut self, iri: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(iri.into(), value.into());
        self
    }

    /// Bind `iri` to `value`.
    pub fn insert(&mut self, iri: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(iri.into(), value.into());
    }

    /// Number of bound IRIs.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Value)> for StaticReferences {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl OperandResolver for StaticReferences {
    fn resolve(&self, iri: &str) -> Resolution {
        match self.values.get(iri) {
            Some(v) => Resolution::Value(v.clone()),
            None => Resolution::Unavailable,
        }
    }
}
