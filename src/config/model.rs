// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{DispatchMode, ErrorBehavior, SchedulingMode};

/// Plan file exactly as read from TOML, before validation.
///
/// ```toml
/// [sequence]
/// name = "build"
/// scheduling = "parallel"
/// error_behavior = "abort"
/// dispatch = "thread_pool"
///
/// [operation.fetch]
/// cmd = "echo fetch"
///
/// [operation.compile]
/// cmd = "echo compile"
/// after = ["fetch"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub sequence: SequenceSection,

    /// All operations from `[operation.<name>]`, keyed by name.
    #[serde(default)]
    pub operation: BTreeMap<String, OperationConfig>,
}

/// `[sequence]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SequenceSection {
    #[serde(default = "default_sequence_name")]
    pub name: String,

    /// `"sequential"` (default) or `"parallel"`.
    #[serde(default)]
    pub scheduling: SchedulingMode,

    /// `"ignore"`, `"log_only"` (default) or `"abort"`.
    #[serde(default)]
    pub error_behavior: ErrorBehavior,

    /// Dispatch mode for operations that do not set their own.
    #[serde(default)]
    pub dispatch: DispatchMode,
}

fn default_sequence_name() -> String {
    "opgraph".to_string()
}

impl Default for SequenceSection {
    fn default() -> Self {
        Self {
            name: default_sequence_name(),
            scheduling: SchedulingMode::default(),
            error_behavior: ErrorBehavior::default(),
            dispatch: DispatchMode::default(),
        }
    }
}

/// `[operation.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationConfig {
    /// Shell command to run.
    pub cmd: String,

    /// Operations that must finish before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// Per-operation dispatch override.
    #[serde(default)]
    pub dispatch: Option<DispatchMode>,

    /// Regex applied to each stdout line; its first capture group is read as
    /// a percentage and reported as progress.
    #[serde(default)]
    pub progress_pattern: Option<String>,
}

impl OperationConfig {
    pub fn effective_dispatch(&self, default: DispatchMode) -> DispatchMode {
        self.dispatch.unwrap_or(default)
    }
}

/// A plan that passed validation. Only built through
/// `PlanFile::try_from(RawPlanFile)`.
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub sequence: SequenceSection,
    pub operation: BTreeMap<String, OperationConfig>,
}

impl PlanFile {
    pub(crate) fn new_unchecked(
        sequence: SequenceSection,
        operation: BTreeMap<String, OperationConfig>,
    ) -> Self {
        Self { sequence, operation }
    }
}
