// src/sequence/hooks.rs

//! Collaborators a sequence talks to while it runs.

use tracing::error;

use crate::operation::Operation;

/// Log collaborator: receives child failures when the sequence's
/// `ErrorBehavior` asks for them to be surfaced.
pub trait ErrorSink: Send + Sync {
    fn error(&self, message: &str);
}

/// Default sink: writes through `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn error(&self, message: &str) {
        error!(target: "opgraph::sequence", "{message}");
    }
}

/// Instrumentation points around every child a sequence runs.
pub trait SequenceHooks: Send + Sync {
    /// Called right before `op` is run.
    fn start_operation(&self, _op: &Operation) {}

    /// Called once `op` has ended.
    fn finish_operation(&self, _op: &Operation) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl SequenceHooks for NoHooks {}
