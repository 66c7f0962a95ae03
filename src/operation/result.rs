// src/operation/result.rs

use std::fmt;

use crate::errors::{ChildFailure, OperationError};

/// Outcome of the most recent run of an operation.
///
/// The default value is a success; an operation that never ran reports
/// success with progress `0.0`.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    error: Option<OperationError>,
}

impl ExecutionResult {
    pub fn success() -> Self {
        Self { error: None }
    }

    pub fn from_error(error: OperationError) -> Self {
        Self { error: Some(error) }
    }

    pub fn cancelled() -> Self {
        Self::from_error(OperationError::Cancelled)
    }

    /// Aggregate child failures into one result.
    ///
    /// No failures is a success; otherwise the error is a
    /// [`OperationError::Composite`] listing every failed child.
    pub fn composite(failures: Vec<ChildFailure>) -> Self {
        if failures.is_empty() {
            Self::success()
        } else {
            Self::from_error(OperationError::Composite(failures))
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(OperationError::is_cancelled)
    }

    pub fn error(&self) -> Option<&OperationError> {
        self.error.as_ref()
    }

    pub fn description(&self) -> String {
        match &self.error {
            None => "success".to_string(),
            Some(err) => err.to_string(),
        }
    }

    /// Turn the result into a `Result` so callers can use `?` on it.
    pub fn ensure_success(&self) -> Result<(), OperationError> {
        match &self.error {
            None => Ok(()),
            Some(err) => Err(err.clone()),
        }
    }

    pub fn into_result(self) -> Result<(), OperationError> {
        match self.error {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl From<Result<(), OperationError>> for ExecutionResult {
    fn from(res: Result<(), OperationError>) -> Self {
        match res {
            Ok(()) => Self::success(),
            Err(err) => Self::from_error(err),
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}
