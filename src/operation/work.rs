// src/operation/work.rs

//! Lifecycle hooks driven by the operation engine.

use crate::errors::OperationError;
use crate::operation::RunContext;

/// The work an [`Operation`](crate::operation::Operation) performs.
///
/// Only [`execute`](Work::execute) is required. The engine calls the hooks in
/// this order on every run:
///
/// 1. `initialize`: an error here ends the run without raising `Started`.
/// 2. `execute`: the actual work. Poll `ctx.is_cancelled()` or call
///    `ctx.check_cancelled()?` to cooperate with cancellation.
/// 3. `cleanup`: always, exactly once, panics swallowed.
///
/// `cancelling` / `cancelled` bracket an explicit
/// [`Operation::cancel`](crate::operation::Operation::cancel): the first runs
/// right after the cancellation signal is issued, the second once the run
/// has stopped.
pub trait Work: Send + Sync + 'static {
    fn initialize(&self, _ctx: &RunContext) -> Result<(), OperationError> {
        Ok(())
    }

    fn execute(&self, ctx: &RunContext) -> Result<(), OperationError>;

    fn cleanup(&self, _was_cancelled: bool) {}

    fn cancelling(&self) {}

    fn cancelled(&self) {}
}

/// Relay work wrapping a plain function.
pub struct FnWork<F> {
    f: F,
}

impl<F> FnWork<F>
where
    F: Fn(&RunContext) -> Result<(), OperationError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Work for FnWork<F>
where
    F: Fn(&RunContext) -> Result<(), OperationError> + Send + Sync + 'static,
{
    fn execute(&self, ctx: &RunContext) -> Result<(), OperationError> {
        (self.f)(ctx)
    }
}
