//! Append-only record of the actions an entity performed

use chrono::{DateTime, Utc};
use ha_core::EntityId;
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// What happened to the remote call behind a log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum Outcome {
    /// The remote call has been sent and not answered yet
    Pending,
    Succeeded,
    Failed(String),
    /// The caller gave up on the remote call before it answered
    Cancelled,
}

/// One performed action
///
/// Entries record intent: they are written before the remote call is sent
/// and resolved with its result, so a call that never completes still leaves
/// an entry behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub action: String,
    pub entity_id: EntityId,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
}

/// Shared, append-only operation log
///
/// Clones append to the same log, which lets bound actions keep recording
/// after the entity that created them is gone.
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, returning its position
    pub fn append(&self, entry: LogEntry) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(entry);
        entries.len() - 1
    }

    /// Set the outcome of the entry at `index`
    pub fn resolve(&self, index: usize, outcome: Outcome) {
        if let Some(entry) = self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(index)
        {
            entry.outcome = outcome;
        }
    }

    /// Snapshot of all entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
