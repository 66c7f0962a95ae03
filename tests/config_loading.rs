// tests/config_loading.rs

use std::io::Write;

use opgraph::config::{load_and_validate, load_from_path};
use opgraph::errors::OpgraphError;
use opgraph::types::{DispatchMode, ErrorBehavior, SchedulingMode};
use opgraph_test_utils::builders::{OperationConfigBuilder, PlanBuilder};
use tempfile::NamedTempFile;

mod common;
use common::TestResult;

fn write_plan(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
fn test_full_plan_parses_with_overrides() -> TestResult {
    let file = write_plan(
        r#"
[sequence]
name = "build"
scheduling = "parallel"
error_behavior = "abort"
dispatch = "thread_pool"

[operation.fetch]
cmd = "echo fetch"

[operation.compile]
cmd = "echo compile"
after = ["fetch"]
dispatch = "background_thread"
progress_pattern = "(\\d+)%"
"#,
    );

    let plan = load_and_validate(file.path())?;
    assert_eq!(plan.sequence.name, "build");
    assert_eq!(plan.sequence.scheduling, SchedulingMode::Parallel);
    assert_eq!(plan.sequence.error_behavior, ErrorBehavior::Abort);
    assert_eq!(plan.sequence.dispatch, DispatchMode::ThreadPool);

    let compile = &plan.operation["compile"];
    assert_eq!(compile.after, vec!["fetch"]);
    assert_eq!(
        compile.effective_dispatch(plan.sequence.dispatch),
        DispatchMode::BackgroundThread
    );
    assert_eq!(
        plan.operation["fetch"].effective_dispatch(plan.sequence.dispatch),
        DispatchMode::ThreadPool
    );
    Ok(())
}

#[test]
fn test_defaults_apply_without_sequence_section() -> TestResult {
    let file = write_plan(
        r#"
[operation.only]
cmd = "true"
"#,
    );

    let plan = load_and_validate(file.path())?;
    assert_eq!(plan.sequence.name, "opgraph");
    assert_eq!(plan.sequence.scheduling, SchedulingMode::Sequential);
    assert_eq!(plan.sequence.error_behavior, ErrorBehavior::LogOnly);
    assert_eq!(plan.sequence.dispatch, DispatchMode::Synchronous);
    Ok(())
}

#[test]
fn test_dag_cycle_returns_structured_error() {
    let file = write_plan(
        r#"
[operation.A]
cmd = "echo A"
after = ["B"]

[operation.B]
cmd = "echo B"
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(OpgraphError::DependencyCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains("A") || msg.contains("B"));
        }
        Err(e) => panic!("Expected DependencyCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_dependency_returns_config_error() {
    let file = write_plan(
        r#"
[operation.A]
cmd = "echo A"
after = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(OpgraphError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_self_dependency_is_rejected() {
    let raw = PlanBuilder::new()
        .with_operation("loop", OperationConfigBuilder::new("true").after("loop").build())
        .build_raw();

    match opgraph::config::PlanFile::try_from(raw) {
        Err(OpgraphError::SelfDependency(msg)) => assert!(msg.contains("loop")),
        other => panic!("Expected SelfDependency, got: {:?}", other),
    }
}

#[test]
fn test_empty_plan_is_rejected() {
    let file = write_plan("[sequence]\nname = \"nothing\"\n");
    assert!(matches!(
        load_and_validate(file.path()),
        Err(OpgraphError::ConfigError(_))
    ));
}

#[test]
fn test_bad_progress_pattern_is_rejected() {
    let raw = PlanBuilder::new()
        .with_operation(
            "a",
            OperationConfigBuilder::new("true").progress_pattern("([0-9]+").build(),
        )
        .build_raw();
    assert!(matches!(
        opgraph::config::PlanFile::try_from(raw),
        Err(OpgraphError::ConfigError(_))
    ));

    let raw = PlanBuilder::new()
        .with_operation(
            "a",
            OperationConfigBuilder::new("true").progress_pattern("[0-9]+%").build(),
        )
        .build_raw();
    match opgraph::config::PlanFile::try_from(raw) {
        Err(OpgraphError::ConfigError(msg)) => assert!(msg.contains("capture group")),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

#[test]
fn test_unknown_enum_value_is_toml_error() {
    let file = write_plan(
        r#"
[sequence]
scheduling = "sideways"

[operation.a]
cmd = "true"
"#,
    );
    assert!(matches!(
        load_from_path(file.path()),
        Err(OpgraphError::TomlError(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    assert!(matches!(
        load_and_validate("/definitely/not/here/Opgraph.toml"),
        Err(OpgraphError::IoError(_))
    ));
}
