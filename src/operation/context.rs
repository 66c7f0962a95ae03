// src/operation/context.rs

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::errors::OperationError;
use crate::operation::Operation;

/// Longest single nap taken by [`RunContext::sleep`] between cancellation
/// checks.
const SLEEP_SLICE: Duration = Duration::from_millis(5);

/// Per-run view handed to [`Work`](crate::operation::Work) hooks.
///
/// Carries the run's cancellation token (a child of any token passed to
/// [`Operation::run_with`]) and lets the hooks report progress.
#[derive(Clone)]
pub struct RunContext {
    operation: Operation,
    token: CancellationToken,
}

impl RunContext {
    pub(crate) fn new(operation: Operation, token: CancellationToken) -> Self {
        Self { operation, token }
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn name(&self) -> &str {
        self.operation.name()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// `Err(OperationError::Cancelled)` once cancellation was requested.
    pub fn check_cancelled(&self) -> Result<(), OperationError> {
        if self.token.is_cancelled() {
            Err(OperationError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn set_progress(&self, value: f64) {
        self.operation.set_progress(value);
    }

    pub fn progress(&self) -> f64 {
        self.operation.progress()
    }

    /// Sleep for `duration`, waking early with `Err(Cancelled)` if the run is
    /// cancelled meanwhile.
    pub fn sleep(&self, duration: Duration) -> Result<(), OperationError> {
        let deadline = Instant::now() + duration;
        loop {
            self.check_cancelled()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
