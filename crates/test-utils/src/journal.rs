#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use opgraph::operation::{Operation, OperationEvent};
use opgraph::sequence::{ErrorSink, SequenceHooks};

#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub operation: String,
    pub event: OperationEvent,
}

/// Records events of every attached operation in one global order.
#[derive(Debug, Clone, Default)]
pub struct EventJournal {
    entries: Arc<Mutex<Vec<JournalEntry>>>,
}

impl EventJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, op: &Operation) {
        let entries = Arc::clone(&self.entries);
        op.subscribe(move |op, event| {
            entries.lock().unwrap().push(JournalEntry {
                operation: op.name().to_string(),
                event: *event,
            });
        });
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Index of the first `event` raised by `operation`.
    pub fn index_of(&self, operation: &str, event: OperationEvent) -> Option<usize> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .position(|e| e.operation == operation && e.event == event)
    }

    pub fn events_of(&self, operation: &str) -> Vec<OperationEvent> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.operation == operation)
            .map(|e| e.event)
            .collect()
    }

    pub fn progress_of(&self, operation: &str) -> Vec<f64> {
        self.events_of(operation)
            .into_iter()
            .filter_map(|event| match event {
                OperationEvent::ProgressChanged(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, operation: &str, event: OperationEvent) -> usize {
        self.events_of(operation)
            .into_iter()
            .filter(|e| *e == event)
            .count()
    }
}

/// [`ErrorSink`] that keeps every message.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl ErrorSink for RecordingSink {
    fn error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// [`SequenceHooks`] that records `start:<name>` / `finish:<name>` markers.
#[derive(Debug, Clone, Default)]
pub struct RecordingHooks {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingHooks {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SequenceHooks for RecordingHooks {
    fn start_operation(&self, op: &Operation) {
        self.calls.lock().unwrap().push(format!("start:{}", op.name()));
    }

    fn finish_operation(&self, op: &Operation) {
        self.calls.lock().unwrap().push(format!("finish:{}", op.name()));
    }
}
