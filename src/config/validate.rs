// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use regex::Regex;

use crate::config::model::{PlanFile, RawPlanFile};
use crate::errors::{OpgraphError, Result};

impl TryFrom<RawPlanFile> for PlanFile {
    type Error = OpgraphError;

    fn try_from(raw: RawPlanFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_plan(&raw)?;
        Ok(PlanFile::new_unchecked(raw.sequence, raw.operation))
    }
}

fn validate_raw_plan(plan: &RawPlanFile) -> Result<()> {
    ensure_has_operations(plan)?;
    validate_commands(plan)?;
    validate_dependencies(plan)?;
    validate_progress_patterns(plan)?;
    validate_dag(plan)?;
    Ok(())
}

fn ensure_has_operations(plan: &RawPlanFile) -> Result<()> {
    if plan.operation.is_empty() {
        return Err(OpgraphError::ConfigError(
            "plan must contain at least one [operation.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_commands(plan: &RawPlanFile) -> Result<()> {
    for (name, op) in plan.operation.iter() {
        if op.cmd.trim().is_empty() {
            return Err(OpgraphError::ConfigError(format!(
                "operation '{}' has an empty `cmd`",
                name
            )));
        }
    }
    Ok(())
}

fn validate_dependencies(plan: &RawPlanFile) -> Result<()> {
    for (name, op) in plan.operation.iter() {
        for dep in op.after.iter() {
            if dep == name {
                return Err(OpgraphError::SelfDependency(format!(
                    "operation '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !plan.operation.contains_key(dep) {
                return Err(OpgraphError::ConfigError(format!(
                    "operation '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_progress_patterns(plan: &RawPlanFile) -> Result<()> {
    for (name, op) in plan.operation.iter() {
        if let Some(pattern) = &op.progress_pattern {
            let re = Regex::new(pattern).map_err(|e| {
                OpgraphError::ConfigError(format!(
                    "operation '{}' has an invalid `progress_pattern`: {}",
                    name, e
                ))
            })?;
            if re.captures_len() < 2 {
                return Err(OpgraphError::ConfigError(format!(
                    "operation '{}': `progress_pattern` needs a capture group for the percentage",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(plan: &RawPlanFile) -> Result<()> {
    // Edge direction: dep -> operation, so a topological order is a valid
    // execution order.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in plan.operation.keys() {
        graph.add_node(name.as_str());
    }

    for (name, op) in plan.operation.iter() {
        for dep in op.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(OpgraphError::DependencyCycle(format!(
            "cycle detected in operation plan involving '{}'",
            cycle.node_id()
        ))),
    }
}
