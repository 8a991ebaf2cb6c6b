//! # Document Ingestion
//!
//! Reads context-resolved ODRL JSON into the policy model.
//!
//! ## Design
//!
//! ODRL JSON is loose: parties and targets may be a string, an `{"@id"}`
//! object, or an array of either; rule groups and constraints may be a
//! single object or an array; composite constraints are keyed by their
//! combinator and `andSequence` wraps its members in `{"@list": [...]}`.
//! The reader absorbs all of that here so the rest of the engine only
//! sees sequences and typed variants.
//!
//! Nesting (constraints inside composites and refinements, duties inside
//! fallback chains) is counted against `EngineConfig::max_document_depth`,
//! so recursion over the document is bounded.
//!
//! `@context` is kept verbatim and never expanded. Keys outside the core
//! vocabulary are kept in each entity's `extensions` map.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::constraint::{
    AtomicConstraint, CompositeConstraint, Constraint, LogicalOperator, Operator,
};
use crate::error::DocumentError;
use crate::policy::{ConflictStrategy, Policy, PolicyType};
use crate::rule::{Action, Duty, Permission, Prohibition, Rule};

const POLICY_KEYS: &[&str] = &[
    "@context",
    "@type",
    "type",
    "@id",
    "id",
    "uid",
    "profile",
    "inheritFrom",
    "conflict",
    "assigner",
    "assignee",
    "target",
    "action",
    "permission",
    "prohibition",
    "obligation",
];

const RULE_KEYS: &[&str] = &[
    "@id",
    "id",
    "uid",
    "assigner",
    "assignee",
    "target",
    "action",
    "constraint",
];

const CONSTRAINT_ID_KEYS: &[&str] = &["uid", "@id", "id", "@type"];

/// Which fallback list a rule object may carry.
#[derive(Debug, Clone, Copy)]
enum FallbackKey {
    Duty,
    Remedy,
    Consequence,
}

impl FallbackKey {
    fn as_str(self) -> &'static str {
        match self {
            Self::Duty => "duty",
            Self::Remedy => "remedy",
            Self::Consequence => "consequence",
        }
    }
}

impl Policy {
    /// Read a policy from an ODRL JSON value.
    pub fn from_json(value: &Value, config: &EngineConfig) -> Result<Self, DocumentError> {
        DocumentReader::new(config).policy(value)
    }

    /// Parse and read a policy from ODRL JSON text.
    pub fn from_json_str(text: &str, config: &EngineConfig) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json(&value, config)
    }
}

/// Reader from ODRL JSON into the policy model.
#[derive(Debug, Clone, Copy)]
pub struct DocumentReader {
    max_depth: usize,
}

impl DocumentReader {
    /// A reader bounded by the configured document depth.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_depth: config.max_document_depth,
        }
    }

    /// Read a policy document.
    pub fn policy(&self, value: &Value) -> Result<Policy, DocumentError> {
        let obj = as_object(value, "$")?;
        let mut policy = Policy::default();

        policy.uid = identifier(obj, "$")?;
        policy.context = obj.get("@context").cloned();
        if let Some(tag) = obj.get("@type").or_else(|| obj.get("type")) {
            policy.policy_type = PolicyType::from(string_or_id(tag, "$.@type")?);
        }
        if let Some(conflict) = obj.get("conflict") {
            policy.conflict = ConflictStrategy::from(string_or_id(conflict, "$.conflict")?);
        }
        if let Some(profile) = obj.get("profile") {
            policy.profile = iri_list(profile, "$.profile")?;
        }
        if let Some(parents) = obj.get("inheritFrom") {
            policy.inherit_from = iri_list(parents, "$.inheritFrom")?;
        }
        policy.assigner = optional_iri_list(obj, "assigner", "$")?;
        policy.assignee = optional_iri_list(obj, "assignee", "$")?;
        policy.target = optional_iri_list(obj, "target", "$")?;
        if let Some(action) = obj.get("action") {
            policy.action = self.actions(action, "action", 0)?;
        }

        if let Some(group) = obj.get("permission") {
            for (i, item) in one_or_many(group).iter().enumerate() {
                let path = format!("permission[{i}]");
                let (rule, duty) = self.rule(item, &path, 0, Some(FallbackKey::Duty))?;
                policy.permission.push(Permission { rule, duty });
            }
        }
        if let Some(group) = obj.get("prohibition") {
            for (i, item) in one_or_many(group).iter().enumerate() {
                let path = format!("prohibition[{i}]");
                let (rule, remedy) = self.rule(item, &path, 0, Some(FallbackKey::Remedy))?;
                policy.prohibition.push(Prohibition { rule, remedy });
            }
        }
        if let Some(group) = obj.get("obligation") {
            for (i, item) in one_or_many(group).iter().enumerate() {
                let path = format!("obligation[{i}]");
                policy.obligation.push(self.duty(item, &path, 0)?);
            }
        }

        policy.extensions = extensions(obj, POLICY_KEYS, "$");
        Ok(policy)
    }

    fn duty(&self, value: &Value, path: &str, depth: usize) -> Result<Duty, DocumentError> {
        let (rule, consequence) = self.rule(value, path, depth, Some(FallbackKey::Consequence))?;
        Ok(Duty { rule, consequence })
    }

    /// Read the shared rule attributes plus the fallback list named by
    /// `fallback`.
    fn rule(
        &self,
        value: &Value,
        path: &str,
        depth: usize,
        fallback: Option<FallbackKey>,
    ) -> Result<(Rule, Vec<Duty>), DocumentError> {
        self.check_depth(path, depth)?;
        let obj = as_object(value, path)?;

        let mut rule = Rule {
            uid: identifier(obj, path)?,
            assigner: optional_iri_list(obj, "assigner", path)?,
            assignee: optional_iri_list(obj, "assignee", path)?,
            target: optional_iri_list(obj, "target", path)?,
            // Absent here means inherited from the policy; validation
            // reports a rule left with none.
            action: match obj.get("action") {
                Some(action) => self.actions(action, &format!("{path}.action"), depth)?,
                None => Vec::new(),
            },
            constraint: Vec::new(),
            extensions: BTreeMap::new(),
        };
        if let Some(constraints) = obj.get("constraint") {
            rule.constraint =
                self.constraints(constraints, &format!("{path}.constraint"), depth)?;
        }

        let mut fallbacks = Vec::new();
        if let Some(key) = fallback {
            if let Some(list) = obj.get(key.as_str()) {
                for (i, item) in one_or_many(list).iter().enumerate() {
                    let child = format!("{path}.{}[{i}]", key.as_str());
                    fallbacks.push(self.duty(item, &child, depth + 1)?);
                }
            }
        }

        let mut known: Vec<&str> = RULE_KEYS.to_vec();
        if let Some(key) = fallback {
            known.push(key.as_str());
        }
        rule.extensions = extensions(obj, &known, path);
        Ok((rule, fallbacks))
    }

    fn actions(
        &self,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Vec<Action>, DocumentError> {
        one_or_many(value)
            .iter()
            .enumerate()
            .map(|(i, item)| self.action(item, &format!("{path}[{i}]"), depth))
            .collect()
    }

    fn action(&self, value: &Value, path: &str, depth: usize) -> Result<Action, DocumentError> {
        match value {
            Value::String(name) => Ok(Action::Name(name.clone())),
            Value::Object(obj) => {
                let name = match obj.get("rdf:value").or_else(|| obj.get("@id")) {
                    Some(v) => string_or_id(v, &format!("{path}.rdf:value"))?,
                    None => {
                        return Err(DocumentError::MissingField {
                            path: path.to_string(),
                            field: "rdf:value",
                        })
                    }
                };
                let refinement = match obj.get("refinement") {
                    Some(r) => self.constraints(r, &format!("{path}.refinement"), depth)?,
                    None => Vec::new(),
                };
                if refinement.is_empty() {
                    Ok(Action::Name(name.to_string()))
                } else {
                    Ok(Action::refined(name, refinement))
                }
            }
            _ => Err(DocumentError::InvalidField {
                path: path.to_string(),
                expected: "an action name or refined action object",
            }),
        }
    }

    fn constraints(
        &self,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Vec<Constraint>, DocumentError> {
        one_or_many(value)
            .iter()
            .enumerate()
            .map(|(i, item)| self.constraint(item, &format!("{path}[{i}]"), depth + 1))
            .collect()
    }

    fn constraint(
        &self,
        value: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Constraint, DocumentError> {
        self.check_depth(path, depth)?;
        let obj = as_object(value, path)?;
        if obj.contains_key("leftOperand") {
            return atomic(obj, path).map(Constraint::Atomic);
        }

        let mut keys = obj
            .keys()
            .filter(|k| !CONSTRAINT_ID_KEYS.contains(&k.as_str()));
        let (key, rest) = (keys.next(), keys.next());
        let key = match (key, rest) {
            (Some(key), None) => key,
            (None, _) => {
                return Err(DocumentError::UnrecognizedConstraint {
                    path: path.to_string(),
                    reason: "neither leftOperand nor a logical operator key".to_string(),
                })
            }
            (Some(a), Some(b)) => {
                return Err(DocumentError::UnrecognizedConstraint {
                    path: path.to_string(),
                    reason: format!("more than one logical operator key ('{a}', '{b}')"),
                })
            }
        };

        let members = match &obj[key] {
            Value::Array(items) => items.as_slice(),
            Value::Object(inner) => match inner.get("@list") {
                Some(Value::Array(items)) => items.as_slice(),
                _ => {
                    return Err(DocumentError::UnrecognizedConstraint {
                        path: path.to_string(),
                        reason: format!("'{key}' must be an array or {{\"@list\": [...]}}"),
                    })
                }
            },
            _ => {
                return Err(DocumentError::UnrecognizedConstraint {
                    path: path.to_string(),
                    reason: format!("'{key}' must be an array or {{\"@list\": [...]}}"),
                })
            }
        };

        let constraints = members
            .iter()
            .enumerate()
            .map(|(i, item)| self.constraint(item, &format!("{path}.{key}[{i}]"), depth + 1))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Constraint::Composite(CompositeConstraint {
            uid: identifier(obj, path)?,
            operator: LogicalOperator::from(key.as_str()),
            constraints,
        }))
    }

    fn check_depth(&self, path: &str, depth: usize) -> Result<(), DocumentError> {
        if depth > self.max_depth {
            return Err(DocumentError::TooDeep {
                path: path.to_string(),
                max: self.max_depth,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

fn atomic(obj: &Map<String, Value>, path: &str) -> Result<AtomicConstraint, DocumentError> {
    let left = obj.get("leftOperand").ok_or_else(|| DocumentError::MissingField {
        path: path.to_string(),
        field: "leftOperand",
    })?;
    let operator = obj.get("operator").ok_or_else(|| DocumentError::MissingField {
        path: path.to_string(),
        field: "operator",
    })?;

    Ok(AtomicConstraint {
        uid: identifier(obj, path)?,
        left_operand: string_or_id(left, &format!("{path}.leftOperand"))?.to_string(),
        operator: Operator::from(string_or_id(operator, &format!("{path}.operator"))?),
        right_operand: obj.get("rightOperand").cloned(),
        right_operand_reference: optional_string(obj, "rightOperandReference", path)?,
        data_type: optional_string(obj, "dataType", path)?,
        unit: optional_string(obj, "unit", path)?,
        status: obj.get("status").cloned(),
    })
}

fn as_object<'v>(value: &'v Value, path: &str) -> Result<&'v Map<String, Value>, DocumentError> {
    value.as_object().ok_or_else(|| DocumentError::NotAnObject {
        path: path.to_string(),
    })
}

/// `x` or `[x, y]` as a slice.
fn one_or_many(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        other => std::slice::from_ref(other),
    }
}

/// A bare string or an `{"@id": "..."}` / `{"uid": "..."}` node.
fn string_or_id<'v>(value: &'v Value, path: &str) -> Result<&'v str, DocumentError> {
    match value {
        Value::String(s) => Ok(s),
        Value::Object(obj) => match obj.get("@id").or_else(|| obj.get("uid")) {
            Some(Value::String(s)) => Ok(s),
            _ => Err(DocumentError::InvalidField {
                path: path.to_string(),
                expected: "a string or an object with a string '@id'",
            }),
        },
        _ => Err(DocumentError::InvalidField {
            path: path.to_string(),
            expected: "a string or an object with a string '@id'",
        }),
    }
}

fn iri_list(value: &Value, path: &str) -> Result<Vec<String>, DocumentError> {
    one_or_many(value)
        .iter()
        .enumerate()
        .map(|(i, v)| string_or_id(v, &format!("{path}[{i}]")).map(str::to_string))
        .collect()
}

fn optional_iri_list(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<Vec<String>>, DocumentError> {
    obj.get(key)
        .map(|v| iri_list(v, &format!("{path}.{key}")))
        .transpose()
}

fn optional_string(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<String>, DocumentError> {
    obj.get(key)
        .map(|v| string_or_id(v, &format!("{path}.{key}")).map(str::to_string))
        .transpose()
}

/// Identifier from `uid`, `@id` or `id`, in that order of preference.
fn identifier(obj: &Map<String, Value>, path: &str) -> Result<Option<String>, DocumentError> {
    for key in ["uid", "@id", "id"] {
        if let Some(v) = obj.get(key) {
            return match v {
                Value::String(s) => Ok(Some(s.clone())),
                _ => Err(DocumentError::InvalidField {
                    path: format!("{path}.{key}"),
                    expected: "a string identifier",
                }),
            };
        }
    }
    Ok(None)
}

fn extensions(obj: &Map<String, Value>, known: &[&str], path: &str) -> BTreeMap<String, Value> {
    obj.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| {
            tracing::trace!(path, key = %k, "keeping non-core property as extension");
            (k.clone(), v.clone())
        })
        .collect()
}
