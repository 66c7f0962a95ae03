#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use opgraph::errors::OperationError;
use opgraph::operation::{Operation, RunContext, Work};
use opgraph::types::DispatchMode;

/// What `execute` does once the progress steps are reported.
#[derive(Debug, Clone)]
pub enum Outcome {
    Succeed,
    Fail(String),
    Panic(String),
    /// Park until the run is cancelled, then return `Cancelled`.
    UntilCancelled,
}

/// Counters for every hook a [`ScriptedWork`] saw.
#[derive(Debug, Default)]
pub struct HookCalls {
    pub initialize: AtomicUsize,
    pub execute: AtomicUsize,
    pub cleanup: AtomicUsize,
    pub cancelling: AtomicUsize,
    pub cancelled: AtomicUsize,
    /// `was_cancelled` passed to the latest `cleanup`.
    pub cleanup_saw_cancel: AtomicBool,
}

impl HookCalls {
    pub fn initialize(&self) -> usize {
        self.initialize.load(Ordering::SeqCst)
    }

    pub fn execute(&self) -> usize {
        self.execute.load(Ordering::SeqCst)
    }

    pub fn cleanup(&self) -> usize {
        self.cleanup.load(Ordering::SeqCst)
    }

    pub fn cancelling(&self) -> usize {
        self.cancelling.load(Ordering::SeqCst)
    }

    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn cleanup_saw_cancel(&self) -> bool {
        self.cleanup_saw_cancel.load(Ordering::SeqCst)
    }
}

/// Test double for [`Work`] with a fixed script.
#[derive(Debug, Clone)]
pub struct ScriptedWork {
    outcome: Outcome,
    delay: Duration,
    progress_steps: Vec<f64>,
    init_failure: Option<String>,
    calls: Arc<HookCalls>,
}

impl ScriptedWork {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            progress_steps: Vec::new(),
            init_failure: None,
            calls: Arc::new(HookCalls::default()),
        }
    }

    pub fn succeed() -> Self {
        Self::new(Outcome::Succeed)
    }

    pub fn fail(message: &str) -> Self {
        Self::new(Outcome::Fail(message.to_string()))
    }

    pub fn panic(message: &str) -> Self {
        Self::new(Outcome::Panic(message.to_string()))
    }

    pub fn until_cancelled() -> Self {
        Self::new(Outcome::UntilCancelled)
    }

    /// Cancellable sleep before the outcome is applied.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_progress(mut self, steps: &[f64]) -> Self {
        self.progress_steps = steps.to_vec();
        self
    }

    pub fn fail_initialize(mut self, message: &str) -> Self {
        self.init_failure = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Arc<HookCalls> {
        Arc::clone(&self.calls)
    }

    /// Wrap into an operation with the given dispatch mode.
    pub fn into_operation(self, name: &str, dispatch: DispatchMode) -> Operation {
        Operation::builder(name, self).dispatch(dispatch).build()
    }
}

impl Work for ScriptedWork {
    fn initialize(&self, _ctx: &RunContext) -> Result<(), OperationError> {
        self.calls.initialize.fetch_add(1, Ordering::SeqCst);
        match &self.init_failure {
            Some(message) => Err(OperationError::failed(message.clone())),
            None => Ok(()),
        }
    }

    fn execute(&self, ctx: &RunContext) -> Result<(), OperationError> {
        self.calls.execute.fetch_add(1, Ordering::SeqCst);
        for step in &self.progress_steps {
            ctx.set_progress(*step);
        }
        if !self.delay.is_zero() {
            ctx.sleep(self.delay)?;
        }
        match &self.outcome {
            Outcome::Succeed => Ok(()),
            Outcome::Fail(message) => Err(OperationError::failed(message.clone())),
            Outcome::Panic(message) => panic!("{message}"),
            Outcome::UntilCancelled => loop {
                ctx.sleep(Duration::from_millis(10))?;
            },
        }
    }

    fn cleanup(&self, was_cancelled: bool) {
        self.calls
            .cleanup_saw_cancel
            .store(was_cancelled, Ordering::SeqCst);
        self.calls.cleanup.fetch_add(1, Ordering::SeqCst);
    }

    fn cancelling(&self) {
        self.calls.cancelling.fetch_add(1, Ordering::SeqCst);
    }

    fn cancelled(&self) {
        self.calls.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}
