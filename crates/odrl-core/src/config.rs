//! # Engine Configuration
//!
//! `EngineConfig` carries the limits and vocabulary the engine runs with.
//! Every field has a default, so an empty YAML document is a valid
//! configuration.
//!
//! ```yaml
//! max_fallback_depth: 8
//! reference_timeout_ms: 500
//! action_hierarchy:
//!   stream: play
//!   play: use
//! ```
//!
//! Configuration is validated at load time: a zero depth cap or a cyclic
//! action hierarchy is rejected before any policy is processed.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, OdrlError};
use crate::vocab::{local_name, DEFAULT_ACTION_HIERARCHY};

/// Default cap on fallback chain depth.
pub const DEFAULT_MAX_FALLBACK_DEPTH: usize = 16;

/// Default cap on JSON nesting accepted by document ingestion.
pub const DEFAULT_MAX_DOCUMENT_DEPTH: usize = 64;

/// Default per-IRI timeout for operand reference prefetching.
pub const DEFAULT_REFERENCE_TIMEOUT_MS: u64 = 2_000;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum depth of duty → consequence / remedy / precondition chains.
    /// Top-level rules are depth 0.
    pub max_fallback_depth: usize,
    /// Maximum JSON nesting depth accepted when reading documents.
    pub max_document_depth: usize,
    /// Action inclusion hierarchy.
    pub action_hierarchy: ActionHierarchy,
    /// Per-IRI timeout when dereferencing `rightOperandReference` values
    /// asynchronously.
    pub reference_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_fallback_depth: DEFAULT_MAX_FALLBACK_DEPTH,
            max_document_depth: DEFAULT_MAX_DOCUMENT_DEPTH,
            action_hierarchy: ActionHierarchy::default(),
            reference_timeout_ms: DEFAULT_REFERENCE_TIMEOUT_MS,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a configuration from YAML.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML configuration file.
    pub fn from_path(path: &Path) -> Result<Self, OdrlError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    /// Builder: set the fallback depth cap.
    pub fn with_max_fallback_depth(mut self, depth: usize) -> Self {
        self.max_fallback_depth = depth;
        self
    }

    /// Builder: replace the action hierarchy.
    pub fn with_action_hierarchy(mut self, hierarchy: ActionHierarchy) -> Self {
        self.action_hierarchy = hierarchy;
        self
    }

    /// The reference timeout as a `Duration`.
    pub fn reference_timeout(&self) -> Duration {
        Duration::from_millis(self.reference_timeout_ms)
    }

    /// Check configuration invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_fallback_depth == 0 {
            return Err(ConfigError::ZeroFallbackDepth);
        }
        if self.max_document_depth == 0 {
            return Err(ConfigError::ZeroDocumentDepth);
        }
        self.action_hierarchy.check_acyclic()
    }
}

/// ODRL `includedIn` relation: child action → parent action.
///
/// A rule over action `A` governs a requested action `B` when `B == A` or
/// `B` is transitively included in `A`. Names are compared by ODRL local
/// name, and deserialized entries are reduced to local names like any
/// other construction path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct ActionHierarchy {
    parents: BTreeMap<String, String>,
}

impl Default for ActionHierarchy {
    fn default() -> Self {
        DEFAULT_ACTION_HIERARCHY
            .iter()
            .map(|(child, parent)| (child.to_string(), parent.to_string()))
            .collect()
    }
}

impl FromIterator<(String, String)> for ActionHierarchy {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            parents: iter
                .into_iter()
                .map(|(c, p)| (local_name(&c).to_string(), local_name(&p).to_string()))
                .collect(),
        }
    }
}

impl From<BTreeMap<String, String>> for ActionHierarchy {
    fn from(parents: BTreeMap<String, String>) -> Self {
        parents.into_iter().collect()
    }
}

impl From<ActionHierarchy> for BTreeMap<String, String> {
    fn from(hierarchy: ActionHierarchy) -> Self {
        hierarchy.parents
    }
}

impl ActionHierarchy {
    /// A hierarchy with no inclusions: actions only match themselves.
    pub fn flat() -> Self {
        Self {
            parents: BTreeMap::new(),
        }
    }

    /// Declare `child` as included in `parent`.
    pub fn with_inclusion(mut self, child: &str, parent: &str) -> Self {
        self.parents
            .insert(local_name(child).to_string(), local_name(parent).to_string());
        self
    }

    /// The direct parent of `action`, if any.
    pub fn parent_of(&self, action: &str) -> Option<&str> {
        self.parents.get(local_name(action)).map(String::as_str)
    }

    /// Whether a rule over `granted` governs a request for `requested`.
    ///
    /// The walk is bounded by the number of declared inclusions, so it
    /// terminates even on a hierarchy that was never validated.
    pub fn includes(&self, granted: &str, requested: &str) -> bool {
        let granted = local_name(granted);
        let mut current = local_name(requested);
        for _ in 0..=self.parents.len() {
            if current == granted {
                return true;
            }
            match self.parents.get(current) {
                Some(parent) => current = parent.as_str(),
                None => return false,
            }
        }
        false
    }

    fn check_acyclic(&self) -> Result<(), ConfigError> {
        for start in self.parents.keys() {
            let mut seen = BTreeSet::new();
            let mut current = start.as_str();
            while let Some(parent) = self.parents.get(current) {
                if !seen.insert(current) {
                    return Err(ConfigError::CyclicActionHierarchy {
                        action: current.to_string(),
                    });
                }
                current = parent.as_str();
            }
        }
        Ok(())
    }
}
