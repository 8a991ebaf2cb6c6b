//! # Request Context
//!
//! The concrete access attempt the engine decides over: who is doing what
//! to which asset, plus the current values of left operands.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The current value of a left operand, optionally with a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperandValue {
    /// The value.
    pub value: Value,
    /// Unit of measurement, if the value is a measured quantity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl OperandValue {
    /// A value with a unit.
    pub fn measured(value: impl Into<Value>, unit: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            unit: Some(unit.into()),
        }
    }
}

impl From<Value> for OperandValue {
    fn from(value: Value) -> Self {
        Self { value, unit: None }
    }
}

/// An access request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// The action being attempted.
    pub action: String,
    /// The acting party.
    pub assignee: String,
    /// The asset acted upon.
    pub target: String,
    /// The party whose policy is being exercised, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigner: Option<String>,
    /// Instant of the request. Supplies the `dateTime` left operand when
    /// `operands` has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
    /// Current left-operand values by name.
    #[serde(default)]
    pub operands: BTreeMap<String, OperandValue>,
}

impl Request {
    /// A request with no operands.
    pub fn new(
        action: impl Into<String>,
        assignee: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            assignee: assignee.into(),
            target: target.into(),
            assigner: None,
            at: None,
            operands: BTreeMap::new(),
        }
    }

    /// Builder: set the assigner.
    pub fn with_assigner(mut self, assigner: impl Into<String>) -> Self {
        self.assigner = Some(assigner.into());
        self
    }

    /// Builder: set the request instant.
    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }

    /// Builder: add a unitless operand value.
    pub fn with_operand(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.operands
            .insert(name.into(), OperandValue::from(value.into()));
        self
    }

    /// Builder: add a measured operand value.
    pub fn with_measured_operand(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
        unit: impl Into<String>,
    ) -> Self {
        self.operands
            .insert(name.into(), OperandValue::measured(value, unit));
        self
    }

    /// Current value of a left operand, if supplied.
    pub fn operand(&self, name: &str) -> Option<&OperandValue> {
        self.operands.get(name)
    }
}
