#![allow(dead_code)]

use std::sync::Arc;

use opgraph::dag::{ByReference, ByValue, DependencyGraph};
use opgraph::operation::Operation;
use opgraph::types::DispatchMode;
use opgraph_test_utils::scripted::ScriptedWork;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Dependency graph over plain names, for tests that only care about shape.
pub type NameGraph = DependencyGraph<&'static str, ByValue>;

pub type ArcGraph = DependencyGraph<Arc<String>, ByReference>;

pub fn instant(name: &str) -> Operation {
    ScriptedWork::succeed().into_operation(name, DispatchMode::Synchronous)
}

pub fn on_pool(name: &str, work: ScriptedWork) -> Operation {
    work.into_operation(name, DispatchMode::ThreadPool)
}

/// Sort partition members by name; order inside a partition is unspecified.
pub fn names_of(partitions: &[opgraph::dag::DependencyPartition<Operation>]) -> Vec<Vec<String>> {
    partitions
        .iter()
        .map(|p| {
            let mut names: Vec<String> = p.iter().map(|op| op.name().to_string()).collect();
            names.sort();
            names
        })
        .collect()
}
