// src/exec/plan.rs

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::model::PlanFile;
use crate::errors::{OpgraphError, Result};
use crate::exec::command::CommandWork;
use crate::operation::Operation;
use crate::sequence::OperationSequence;

/// A sequence built from a plan file, plus its operations by name.
#[derive(Debug, Clone)]
pub struct PlanSequence {
    pub sequence: OperationSequence,
    pub operations: BTreeMap<String, Operation>,
}

impl PlanSequence {
    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    /// Restrict the next run to `name` and everything it depends on.
    pub fn restrict_to(&self, name: &str) -> Result<()> {
        let op = self.operation(name).ok_or_else(|| {
            OpgraphError::ConfigError(format!("unknown operation '{}'", name))
        })?;
        self.sequence.set_targets(Some(vec![op.clone()]))
    }
}

/// Build an [`OperationSequence`] of command operations from a validated plan.
///
/// Operations are registered in name order; `after` entries become
/// dependencies.
pub fn build_sequence(plan: &PlanFile) -> Result<PlanSequence> {
    let section = &plan.sequence;
    let sequence = OperationSequence::new(section.name.clone());
    sequence.set_scheduling_mode(section.scheduling)?;
    sequence.set_error_behavior(section.error_behavior)?;

    let mut operations = BTreeMap::new();
    for (name, cfg) in plan.operation.iter() {
        let work = CommandWork::from_config(name, cfg)?;
        let op = Operation::builder(name.clone(), work)
            .dispatch(cfg.effective_dispatch(section.dispatch))
            .build();
        sequence.append(&op)?;
        operations.insert(name.clone(), op);
    }

    for (name, cfg) in plan.operation.iter() {
        let Some(op) = operations.get(name) else {
            continue;
        };
        for dep in cfg.after.iter() {
            let dep_op = operations.get(dep).ok_or_else(|| {
                OpgraphError::ConfigError(format!(
                    "operation '{}' has unknown dependency '{}' in `after`",
                    name, dep
                ))
            })?;
            sequence.operation(op).depends_on(dep_op)?;
            debug!(operation = %name, after = %dep, "dependency wired");
        }
    }

    Ok(PlanSequence {
        sequence,
        operations,
    })
}
