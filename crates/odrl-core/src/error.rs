//! # Error Types — Structured Error Hierarchy
//!
//! All errors use `thiserror` for derive-based `Display` and `Error`
//! implementations.
//!
//! ## Design
//!
//! - Ingestion errors name the document path that failed and what was
//!   expected there.
//! - Structural errors abort normalization or validation. They are never
//!   raised while evaluating a request.
//! - Missing or unresolvable data during evaluation is not an error: it is
//!   the `Indeterminate` outcome. Likewise an unresolved conflict is a
//!   decision, not an error.

use thiserror::Error;

use crate::violation::Violations;

/// Top-level error type for the ODRL engine.
#[derive(Error, Debug)]
pub enum OdrlError {
    /// The input document could not be read into the policy model.
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// The policy is structurally malformed.
    #[error("structural error: {0}")]
    Structural(#[from] StructuralError),

    /// Engine configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error while reading an ODRL JSON document into the policy model.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The document is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A JSON object was required.
    #[error("{path}: expected a JSON object")]
    NotAnObject {
        /// Document path of the offending value.
        path: String,
    },

    /// A field holds a value of the wrong shape.
    #[error("{path}: expected {expected}")]
    InvalidField {
        /// Document path of the offending value.
        path: String,
        /// Description of the accepted shapes.
        expected: &'static str,
    },

    /// A required field is absent.
    #[error("{path}: missing required field '{field}'")]
    MissingField {
        /// Document path of the enclosing object.
        path: String,
        /// Name of the absent field.
        field: &'static str,
    },

    /// An object in constraint position is neither atomic nor composite.
    #[error("{path}: unrecognized constraint shape: {reason}")]
    UnrecognizedConstraint {
        /// Document path of the constraint.
        path: String,
        /// Why the shape was rejected.
        reason: String,
    },

    /// Nesting exceeds the configured document depth.
    #[error("{path}: nesting exceeds maximum document depth {max}")]
    TooDeep {
        /// Document path where the limit was hit.
        path: String,
        /// The configured maximum.
        max: usize,
    },
}

/// A malformed policy. Raised by normalization and validation, never by
/// evaluation.
#[derive(Error, Debug)]
pub enum StructuralError {
    /// A duty → consequence (or remedy/precondition) chain is deeper than
    /// the configured cap.
    #[error("{path}: fallback chain depth {depth} exceeds maximum {max}")]
    FallbackDepthExceeded {
        /// Path of the first rule beyond the cap.
        path: String,
        /// Depth of that rule.
        depth: usize,
        /// The configured maximum.
        max: usize,
    },

    /// Validation found one or more violations.
    #[error("policy failed validation:\n{0}")]
    Invalid(Violations),
}

/// Invalid engine configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `max_fallback_depth` must allow at least top-level rules plus one
    /// level of fallback.
    #[error("max_fallback_depth must be at least 1")]
    ZeroFallbackDepth,

    /// `max_document_depth` must be positive.
    #[error("max_document_depth must be at least 1")]
    ZeroDocumentDepth,

    /// The action hierarchy contains a cycle.
    #[error("action hierarchy contains a cycle through '{action}'")]
    CyclicActionHierarchy {
        /// An action on the cycle.
        action: String,
    },

    /// The YAML configuration could not be parsed.
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
