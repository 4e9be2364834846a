//! Change report - per-task outcomes of a plan or apply run

use crate::task::{FieldChange, TaskKey};
use crate::types::{Mode, Outcome, TaskState};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

/// Outcome of one task, recorded once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub key: TaskKey,
    pub description: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Field differences found during discovery
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<FieldChange>,
    /// State the task was left in
    pub state: TaskState,
}

impl ReportEntry {
    pub fn would_change(&self) -> bool {
        self.outcome.is_change()
    }

    /// Failure cause, if the task failed
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { cause } => Some(cause),
            _ => None,
        }
    }
}

/// Rejected report write
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("task {0} is not part of this run")]
    UnknownTask(TaskKey),

    #[error("task {0} was already recorded")]
    AlreadyRecorded(TaskKey),
}

/// Aggregate run result, used for the CLI exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Nothing left to change
    Converged,
    /// A plan found changes to make
    ChangesPending,
    /// At least one task failed or was skipped
    Error,
}

/// Per-outcome counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub applied: usize,
    pub would_apply: usize,
    pub no_op: usize,
    pub warned: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl ReportSummary {
    /// Number of tasks that changed (or would change) real state
    pub fn total_changes(&self) -> usize {
        self.applied + self.would_apply
    }

    /// No failures and no skips
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn total(&self) -> usize {
        self.applied + self.would_apply + self.no_op + self.warned + self.skipped + self.failed
    }

    pub fn add_outcome(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Applied => self.applied += 1,
            Outcome::WouldApply => self.would_apply += 1,
            Outcome::NoOp => self.no_op += 1,
            Outcome::Warned => self.warned += 1,
            Outcome::Skipped { .. } => self.skipped += 1,
            Outcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Map from task to outcome, safe for concurrent writers
///
/// Every task owns one slot, so writers never contend with each other and
/// a slot can be filled only once.
#[derive(Debug)]
pub struct ChangeReport {
    mode: Mode,
    keys: Vec<TaskKey>,
    index: HashMap<TaskKey, usize>,
    slots: Vec<OnceLock<ReportEntry>>,
}

impl ChangeReport {
    /// Create an empty report; `keys` fixes the iteration order
    pub fn new(mode: Mode, keys: Vec<TaskKey>) -> Self {
        let index = keys
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), i))
            .collect();
        let slots = keys.iter().map(|_| OnceLock::new()).collect();
        Self {
            mode,
            keys,
            index,
            slots,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Record a task's entry
    pub fn record(&self, entry: ReportEntry) -> Result<(), ReportError> {
        let Some(&i) = self.index.get(&entry.key) else {
            return Err(ReportError::UnknownTask(entry.key));
        };
        let key = entry.key.clone();
        self.slots[i]
            .set(entry)
            .map_err(|_| ReportError::AlreadyRecorded(key))
    }

    pub fn get(&self, key: &TaskKey) -> Option<&ReportEntry> {
        self.index.get(key).and_then(|&i| self.slots[i].get())
    }

    /// Recorded entries in run order
    pub fn entries(&self) -> impl Iterator<Item = &ReportEntry> {
        self.slots.iter().filter_map(OnceLock::get)
    }

    /// Tasks without an entry yet
    pub fn missing(&self) -> Vec<&TaskKey> {
        self.keys
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.get().is_none())
            .map(|(key, _)| key)
            .collect()
    }

    pub fn summary(&self) -> ReportSummary {
        let mut summary = ReportSummary::default();
        for entry in self.entries() {
            summary.add_outcome(&entry.outcome);
        }
        summary
    }

    pub fn outcome(&self) -> RunOutcome {
        let summary = self.summary();
        if !summary.is_success() || !self.missing().is_empty() {
            RunOutcome::Error
        } else if summary.would_apply > 0 {
            RunOutcome::ChangesPending
        } else {
            RunOutcome::Converged
        }
    }
}

impl Serialize for ChangeReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<&ReportEntry> = self.entries().collect();
        let mut state = serializer.serialize_struct("ChangeReport", 4)?;
        state.serialize_field("mode", &self.mode)?;
        state.serialize_field("outcome", &self.outcome())?;
        state.serialize_field("summary", &self.summary())?;
        state.serialize_field("tasks", &entries)?;
        state.end()
    }
}
