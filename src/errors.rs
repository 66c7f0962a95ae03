// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Two families live here:
//! - [`OpgraphError`]: programmer / construction / config errors. These are
//!   returned synchronously from the call that caused them.
//! - [`OperationError`]: the outcome of a run. It is stored inside an
//!   [`ExecutionResult`](crate::operation::ExecutionResult), so it is `Clone`.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpgraphError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Self dependency: {0}")]
    SelfDependency(String),

    #[error("Cycle detected in dependency graph: {0}")]
    DependencyCycle(String),

    #[error("Self reference is not allowed in this graph: {0}")]
    SelfReference(String),

    #[error("Cannot modify '{0}' while it is running")]
    ModifiedWhileRunning(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, OpgraphError>;

/// One failed child inside a composite sequence result.
#[derive(Debug, Clone)]
pub struct ChildFailure {
    pub operation: String,
    pub error: OperationError,
}

impl fmt::Display for ChildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.error)
    }
}

/// Why a run did not succeed.
#[derive(Error, Debug, Clone)]
pub enum OperationError {
    #[error("operation was cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),

    #[error("operation panicked: {0}")]
    Panicked(String),

    #[error("dependency cycle: {0}")]
    DependencyCycle(String),

    #[error("{}", describe_failures(.0))]
    Composite(Vec<ChildFailure>),

    #[error("{0:#}")]
    Other(Arc<anyhow::Error>),
}

impl OperationError {
    pub fn failed(message: impl Into<String>) -> Self {
        OperationError::Failed(message.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperationError::Cancelled)
    }
}

impl From<anyhow::Error> for OperationError {
    fn from(err: anyhow::Error) -> Self {
        OperationError::Other(Arc::new(err))
    }
}

impl From<OpgraphError> for OperationError {
    fn from(err: OpgraphError) -> Self {
        match err {
            OpgraphError::DependencyCycle(msg) => OperationError::DependencyCycle(msg),
            other => OperationError::Failed(other.to_string()),
        }
    }
}

fn describe_failures(failures: &[ChildFailure]) -> String {
    match failures {
        [] => "no operation failed".to_string(),
        [single] => single.to_string(),
        many => format!(
            "{} operations failed: {}",
            many.len(),
            many.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ")
        ),
    }
}
