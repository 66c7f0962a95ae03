// src/types.rs

//! Policy enums shared by the runtime and the config layer.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which execution context runs an operation's lifecycle.
///
/// - `Synchronous`: inline on the caller's thread; `run` blocks until done.
/// - `BackgroundThread`: a dedicated, named OS thread per run.
/// - `ThreadPool`: queued onto the shared worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    #[default]
    Synchronous,
    BackgroundThread,
    ThreadPool,
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "synchronous" | "sync" => Ok(DispatchMode::Synchronous),
            "background_thread" | "thread" => Ok(DispatchMode::BackgroundThread),
            "thread_pool" | "pool" => Ok(DispatchMode::ThreadPool),
            other => Err(format!(
                "invalid dispatch mode: {other} (expected \"synchronous\", \"background_thread\" or \"thread_pool\")"
            )),
        }
    }
}

/// How members of a single partition run relative to each other.
///
/// Cross-partition order is always respected regardless of this setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulingMode {
    #[default]
    Sequential,
    Parallel,
}

impl FromStr for SchedulingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(SchedulingMode::Sequential),
            "parallel" => Ok(SchedulingMode::Parallel),
            other => Err(format!(
                "invalid scheduling mode: {other} (expected \"sequential\" or \"parallel\")"
            )),
        }
    }
}

/// Reaction of a sequence to a child whose result has an error.
///
/// Ordered: `Ignore < LogOnly < Abort`. Anything above `Ignore` reports the
/// failure to the sequence's error sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorBehavior {
    Ignore,
    #[default]
    LogOnly,
    Abort,
}

impl FromStr for ErrorBehavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ignore" => Ok(ErrorBehavior::Ignore),
            "log_only" | "logonly" | "log" => Ok(ErrorBehavior::LogOnly),
            "abort" => Ok(ErrorBehavior::Abort),
            other => Err(format!(
                "invalid error behavior: {other} (expected \"ignore\", \"log_only\" or \"abort\")"
            )),
        }
    }
}

/// Lifecycle state of an operation.
///
/// `Completed` and `Aborted` are resting states: a new run moves the
/// operation back through `Initializing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    Initializing,
    Running,
    Completed,
    Aborted,
}

impl OperationState {
    pub fn is_active(self) -> bool {
        matches!(self, OperationState::Initializing | OperationState::Running)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationState::Idle => "idle",
            OperationState::Initializing => "initializing",
            OperationState::Running => "running",
            OperationState::Completed => "completed",
            OperationState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}
