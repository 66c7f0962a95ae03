#![allow(dead_code)]

use std::collections::BTreeMap;

use opgraph::config::{OperationConfig, PlanFile, RawPlanFile, SequenceSection};
use opgraph::types::{DispatchMode, ErrorBehavior, SchedulingMode};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanBuilder {
    plan: RawPlanFile,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                sequence: SequenceSection::default(),
                operation: BTreeMap::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.plan.sequence.name = name.to_string();
        self
    }

    pub fn scheduling(mut self, mode: SchedulingMode) -> Self {
        self.plan.sequence.scheduling = mode;
        self
    }

    pub fn error_behavior(mut self, behavior: ErrorBehavior) -> Self {
        self.plan.sequence.error_behavior = behavior;
        self
    }

    pub fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.plan.sequence.dispatch = mode;
        self
    }

    pub fn with_operation(mut self, name: &str, op: OperationConfig) -> Self {
        self.plan.operation.insert(name.to_string(), op);
        self
    }

    pub fn build_raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `OperationConfig`.
pub struct OperationConfigBuilder {
    op: OperationConfig,
}

impl OperationConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            op: OperationConfig {
                cmd: cmd.to_string(),
                after: vec![],
                dispatch: None,
                progress_pattern: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.op.after.push(dep.to_string());
        self
    }

    pub fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.op.dispatch = Some(mode);
        self
    }

    pub fn progress_pattern(mut self, pattern: &str) -> Self {
        self.op.progress_pattern = Some(pattern.to_string());
        self
    }

    pub fn build(self) -> OperationConfig {
        self.op
    }
}
