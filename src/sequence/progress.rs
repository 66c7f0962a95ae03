// src/sequence/progress.rs

//! Per-child progress snapshots ("detail progress") kept by a sequence.

use std::collections::HashMap;

/// Lightweight view of one child operation inside a sequence run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub name: String,
    pub progress: f64,
    /// The child has not been started in this run.
    pub is_idle: bool,
    pub is_initializing: bool,
    /// The child failed, was cancelled, or was skipped because the run
    /// aborted.
    pub is_aborted: bool,
    /// The child reached a terminal state (including skipped).
    pub is_completed: bool,
}

impl ProgressRecord {
    pub(crate) fn idle(name: &str) -> Self {
        Self {
            name: name.to_string(),
            progress: 0.0,
            is_idle: true,
            is_initializing: false,
            is_aborted: false,
            is_completed: false,
        }
    }
}

/// Records keyed by operation id, iterated in the order they were added.
#[derive(Debug, Default)]
pub(crate) struct DetailProgress {
    order: Vec<usize>,
    records: HashMap<usize, ProgressRecord>,
}

impl DetailProgress {
    pub(crate) fn clear(&mut self) {
        self.order.clear();
        self.records.clear();
    }

    pub(crate) fn insert(&mut self, id: usize, record: ProgressRecord) {
        if self.records.insert(id, record).is_none() {
            self.order.push(id);
        }
    }

    pub(crate) fn update(&mut self, id: usize, f: impl FnOnce(&mut ProgressRecord)) {
        if let Some(record) = self.records.get_mut(&id) {
            f(record);
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<ProgressRecord> {
        self.order
            .iter()
            .filter_map(|id| self.records.get(id).cloned())
            .collect()
    }
}
