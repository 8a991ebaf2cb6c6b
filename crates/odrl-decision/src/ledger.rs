//! # Duty Ledger
//!
//! Tracks the fulfillment state of triggered duties. The ledger is owned
//! by the caller, never by a policy: the engine only reads it, through
//! [`DutyStatusView`], to decide whether preconditions are met.
//!
//! ## State Machine
//!
//! ```text
//! Pending ──fulfil by deadline──▶ Fulfilled
//!    │
//!    └──deadline passes──▶ Lapsed ──▶ ConsequenceTriggered
//! ```
//!
//! `Fulfilled` and `ConsequenceTriggered` are terminal. A fulfillment
//! recorded after the deadline lapses the duty and returns its
//! consequences; it does not count as fulfilled.
//!
//! ## Concurrency
//!
//! [`DutyLedger`] is a plain value. Share it across threads as a
//! [`SharedDutyLedger`], which serializes mutations behind a
//! `parking_lot::Mutex`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::verdict::{DutyKey, TriggeredDuty};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a tracked duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DutyState {
    /// Triggered and awaiting fulfillment.
    Pending,
    /// Fulfilled by its deadline.
    Fulfilled,
    /// Deadline passed without fulfillment.
    Lapsed,
    /// Consequences of the lapse have been surfaced.
    ConsequenceTriggered,
}

impl DutyState {
    /// Every state, in lifecycle order.
    pub const ALL: [DutyState; 4] = [
        DutyState::Pending,
        DutyState::Fulfilled,
        DutyState::Lapsed,
        DutyState::ConsequenceTriggered,
    ];

    /// States reachable in one step.
    pub fn valid_transitions(&self) -> &'static [DutyState] {
        match self {
            Self::Pending => &[Self::Fulfilled, Self::Lapsed],
            Self::Lapsed => &[Self::ConsequenceTriggered],
            Self::Fulfilled | Self::ConsequenceTriggered => &[],
        }
    }

    /// Whether `to` is reachable from this state in one step.
    pub fn can_transition_to(&self, to: DutyState) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// No further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Fulfilled => "FULFILLED",
            Self::Lapsed => "LAPSED",
            Self::ConsequenceTriggered => "CONSEQUENCE_TRIGGERED",
        }
    }
}

impl fmt::Display for DutyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DutyError {
    /// No duty is registered under the key.
    #[error("unknown duty {key}")]
    UnknownDuty {
        /// The key that was looked up.
        key: DutyKey,
    },

    /// The duty's current state does not allow the transition.
    #[error("invalid duty transition for {key}: {from} -> {to}")]
    InvalidTransition {
        /// The duty.
        key: DutyKey,
        /// Current state.
        from: DutyState,
        /// Requested state.
        to: DutyState,
    },
}

/// Result of recording a fulfillment.
#[derive(Debug, Clone, PartialEq)]
pub enum Fulfillment {
    /// Recorded by the deadline; the duty is now `Fulfilled`.
    OnTime,
    /// Recorded after the deadline; the duty lapsed and these
    /// consequences now apply.
    Late {
        /// Consequence duties, in declared order.
        consequences: Vec<TriggeredDuty>,
    },
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// A tracked duty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutyRecord {
    /// Ledger-assigned identifier, for correlating external evidence.
    pub tracking_id: Uuid,
    /// The duty as surfaced by the engine.
    pub duty: TriggeredDuty,
    /// Current state.
    pub state: DutyState,
    /// Fulfillment deadline. `None` never lapses.
    pub deadline: Option<DateTime<Utc>>,
    /// When fulfillment was recorded, on time or late.
    pub fulfilled_at: Option<DateTime<Utc>>,
    /// Every state the duty has passed through, oldest first.
    pub history: Vec<DutyState>,
}

impl DutyRecord {
    fn transition(&mut self, to: DutyState) -> Result<(), DutyError> {
        if !self.state.can_transition_to(to) {
            return Err(DutyError::InvalidTransition {
                key: self.duty.key.clone(),
                from: self.state,
                to,
            });
        }
        tracing::debug!(duty = %self.duty.key, from = %self.state, to = %to, "duty transition");
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    fn lapse(&mut self) -> Result<Vec<TriggeredDuty>, DutyError> {
        self.transition(DutyState::Lapsed)?;
        self.transition(DutyState::ConsequenceTriggered)?;
        Ok(self.duty.consequences.clone())
    }
}

/// Read access to duty states, as consulted by the decision engine.
pub trait DutyStatusView: Send + Sync {
    /// State of the duty under `key`, if tracked.
    fn duty_state(&self, key: &DutyKey) -> Option<DutyState>;
}

/// A view in which no duty is tracked, so none is fulfilled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDuties;

impl DutyStatusView for NoDuties {
    fn duty_state(&self, _key: &DutyKey) -> Option<DutyState> {
        None
    }
}

/// Caller-owned record of triggered duties.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DutyLedger {
    records: BTreeMap<DutyKey, DutyRecord>,
}

impl DutyLedger {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `duty` as `Pending`.
    ///
    /// Registering a key that is already tracked leaves the existing
    /// record untouched and returns its tracking id, so the duties of
    /// repeated verdicts can be registered blindly.
    pub fn register(&mut self, duty: &TriggeredDuty, deadline: Option<DateTime<Utc>>) -> Uuid {
        if let Some(existing) = self.records.get(&duty.key) {
            return existing.tracking_id;
        }
        let record = DutyRecord {
            tracking_id: Uuid::new_v4(),
            duty: duty.clone(),
            state: DutyState::Pending,
            deadline,
            fulfilled_at: None,
            history: vec![DutyState::Pending],
        };
        let id = record.tracking_id;
        tracing::debug!(duty = %duty.key, tracking_id = %id, ?deadline, "duty registered");
        self.records.insert(duty.key.clone(), record);
        id
    }

    /// Record that the duty under `key` was performed at `at`.
    pub fn record_fulfillment(
        &mut self,
        key: &DutyKey,
        at: DateTime<Utc>,
    ) -> Result<Fulfillment, DutyError> {
        let record = self
            .records
            .get_mut(key)
            .ok_or_else(|| DutyError::UnknownDuty { key: key.clone() })?;

        let late = record.deadline.is_some_and(|deadline| at > deadline);
        if late {
            if record.state != DutyState::Pending {
                return Err(DutyError::InvalidTransition {
                    key: key.clone(),
                    from: record.state,
                    to: DutyState::Fulfilled,
                });
            }
            record.fulfilled_at = Some(at);
            let consequences = record.lapse()?;
            tracing::warn!(duty = %key, consequences = consequences.len(), "duty fulfilled late");
            return Ok(Fulfillment::Late { consequences });
        }

        record.transition(DutyState::Fulfilled)?;
        record.fulfilled_at = Some(at);
        Ok(Fulfillment::OnTime)
    }

    /// Lapse every pending duty whose deadline is before `now`, returning
    /// each lapsed key with its consequences, in key order.
    pub fn lapse_overdue(&mut self, now: DateTime<Utc>) -> Vec<(DutyKey, Vec<TriggeredDuty>)> {
        let mut lapsed = Vec::new();
        for (key, record) in &mut self.records {
            let overdue = record.state == DutyState::Pending
                && record.deadline.is_some_and(|deadline| deadline < now);
            if !overdue {
                continue;
            }
            // Pending always admits Lapsed then ConsequenceTriggered.
            if let Ok(consequences) = record.lapse() {
                tracing::warn!(duty = %key, consequences = consequences.len(), "duty lapsed");
                lapsed.push((key.clone(), consequences));
            }
        }
        lapsed
    }

    /// Current state of the duty under `key`.
    pub fn status(&self, key: &DutyKey) -> Option<DutyState> {
        self.records.get(key).map(|r| r.state)
    }

    /// The record under `key`.
    pub fn record(&self, key: &DutyKey) -> Option<&DutyRecord> {
        self.records.get(key)
    }

    /// Every record, in key order.
    pub fn records(&self) -> impl Iterator<Item = &DutyRecord> {
        self.records.values()
    }

    /// Number of tracked duties.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl DutyStatusView for DutyLedger {
    fn duty_state(&self, key: &DutyKey) -> Option<DutyState> {
        self.status(key)
    }
}

// ---------------------------------------------------------------------------
// Shared ledger
// ---------------------------------------------------------------------------

/// A [`DutyLedger`] shared across threads.
///
/// Clones share the same ledger. Each operation holds the lock only for
/// its own duration.
#[derive(Debug, Clone, Default)]
pub struct SharedDutyLedger {
    inner: Arc<Mutex<DutyLedger>>,
}

impl SharedDutyLedger {
    /// Wrap an existing ledger.
    pub fn new(ledger: DutyLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    /// See [`DutyLedger::register`].
    pub fn register(&self, duty: &TriggeredDuty, deadline: Option<DateTime<Utc>>) -> Uuid {
        self.inner.lock().register(duty, deadline)
    }

    /// See [`DutyLedger::record_fulfillment`].
    pub fn record_fulfillment(
        &self,
        key: &DutyKey,
        at: DateTime<Utc>,
    ) -> Result<Fulfillment, DutyError> {
        self.inner.lock().record_fulfillment(key, at)
    }

    /// See [`DutyLedger::lapse_overdue`].
    pub fn lapse_overdue(&self, now: DateTime<Utc>) -> Vec<(DutyKey, Vec<TriggeredDuty>)> {
        self.inner.lock().lapse_overdue(now)
    }

    /// See [`DutyLedger::status`].
    pub fn status(&self, key: &DutyKey) -> Option<DutyState> {
        self.inner.lock().status(key)
    }

    /// Clone of the current ledger contents.
    pub fn snapshot(&self) -> DutyLedger {
        self.inner.lock().clone()
    }
}

impl DutyStatusView for SharedDutyLedger {
    fn duty_state(&self, key: &DutyKey) -> Option<DutyState> {
        self.status(key)
    }
}
