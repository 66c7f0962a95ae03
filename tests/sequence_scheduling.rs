use std::sync::Arc;
use std::time::Duration;

use opgraph::errors::OpgraphError;
use opgraph::operation::OperationEvent;
use opgraph::sequence::OperationSequence;
use opgraph::types::{DispatchMode, ErrorBehavior, SchedulingMode};
use opgraph_test_utils::journal::{EventJournal, RecordingHooks};
use opgraph_test_utils::scripted::ScriptedWork;
use opgraph_test_utils::{init_tracing, with_timeout};

mod common;
use common::{TestResult, instant, names_of, on_pool};

#[test]
fn test_dependency_ends_before_dependent_starts() -> TestResult {
    init_tracing();
    let seq = OperationSequence::new("ordering");
    let a = on_pool("A", ScriptedWork::succeed());
    let b = on_pool("B", ScriptedWork::succeed().with_delay(Duration::from_millis(5)));
    seq.append(&a)?;
    seq.append(&b)?;
    seq.operation(&a).depends_on(&b)?;

    for _ in 0..20 {
        let journal = EventJournal::new();
        journal.attach(&a);
        journal.attach(&b);

        seq.run();

        let b_ended = journal.index_of("B", OperationEvent::Ended).expect("B ended");
        let a_started = journal.index_of("A", OperationEvent::Started).expect("A started");
        assert!(b_ended < a_started);
        assert!(!seq.execution_result().has_error());
    }
    Ok(())
}

#[test]
fn test_parallel_end_to_end() -> TestResult {
    init_tracing();
    let seq = OperationSequence::new("fan-out");
    let a = instant("A");
    let b = instant("B");
    let c = instant("C");
    seq.operation(&b).depends_on(&a)?;
    seq.operation(&c).depends_on(&a)?;
    seq.set_scheduling_mode(SchedulingMode::Parallel)?;
    seq.set_error_behavior(ErrorBehavior::Ignore)?;

    assert_eq!(
        names_of(&seq.partitions()?),
        vec![vec!["A".to_string()], vec!["B".to_string(), "C".to_string()]]
    );

    seq.run();

    assert!(!seq.execution_result().has_error());
    assert_eq!(seq.progress(), 1.0);
    for record in seq.detail_progress() {
        assert!(record.is_completed, "{} completed", record.name);
        assert!(!record.is_aborted);
        assert!(!record.is_idle);
        assert_eq!(record.progress, 1.0);
    }
    Ok(())
}

#[test]
fn test_parallel_partition_runs_concurrently() -> TestResult {
    with_timeout(|| -> Result<(), OpgraphError> {
        let seq = OperationSequence::new("concurrent");
        seq.set_scheduling_mode(SchedulingMode::Parallel)?;
        // Each sibling waits for the other one to have started.
        let gate = Arc::new(std::sync::Barrier::new(2));
        for name in ["left", "right"] {
            let gate = Arc::clone(&gate);
            let op = opgraph::operation::Operation::from_fn(name, move |_| {
                gate.wait();
                Ok(())
            });
            seq.append(&op)?;
        }

        seq.run();
        assert!(!seq.execution_result().has_error());
        Ok(())
    })?;
    Ok(())
}

#[test]
fn test_sequential_progress_is_monotonic_and_finishes_at_one() -> TestResult {
    let seq = OperationSequence::new("progress");
    let first = ScriptedWork::succeed()
        .with_progress(&[0.5])
        .into_operation("first", DispatchMode::Synchronous);
    let second = ScriptedWork::succeed()
        .with_progress(&[0.25, 0.75])
        .into_operation("second", DispatchMode::Synchronous);
    let third = instant("third");
    seq.operation(&second).depends_on(&first)?;
    seq.append(&third)?;

    let journal = EventJournal::new();
    journal.attach(seq.as_operation());
    seq.run();

    let observed = journal.progress_of("progress");
    assert!(observed.windows(2).all(|w| w[0] <= w[1]), "{observed:?}");
    assert_eq!(observed.last().copied(), Some(1.0));
    Ok(())
}

#[test]
fn test_targets_limit_run_to_dependency_closure() -> TestResult {
    let seq = OperationSequence::new("targets");
    let a_work = ScriptedWork::succeed();
    let d_work = ScriptedWork::succeed();
    let a_calls = a_work.calls();
    let d_calls = d_work.calls();
    let a = a_work.into_operation("A", DispatchMode::Synchronous);
    let b = instant("B");
    let c = instant("C");
    let d = d_work.into_operation("D", DispatchMode::Synchronous);
    seq.operation(&b).depends_on(&a)?;
    seq.operation(&c).depends_on(&b)?;
    seq.append(&d)?;

    seq.set_targets(Some(vec![c.clone()]))?;
    assert_eq!(seq.partitions()?.len(), 3);

    seq.run();

    assert_eq!(a_calls.execute(), 1);
    assert_eq!(d_calls.execute(), 0);
    let names: Vec<String> = seq.detail_progress().into_iter().map(|r| r.name).collect();
    assert!(!names.contains(&"D".to_string()));

    seq.set_targets(None)?;
    seq.run();
    assert_eq!(d_calls.execute(), 1);
    Ok(())
}

#[test]
fn test_nested_sequence_runs_as_one_operation() -> TestResult {
    let inner = OperationSequence::new("inner");
    let inner_a = instant("inner-a");
    let inner_b = instant("inner-b");
    inner.operation(&inner_b).depends_on(&inner_a)?;

    let outer = OperationSequence::new("outer");
    let after = instant("after");
    outer.operation(&after).depends_on(inner.as_operation())?;

    let journal = EventJournal::new();
    journal.attach(&inner_b);
    journal.attach(&after);

    outer.run();

    assert!(!outer.execution_result().has_error());
    assert!(inner.is_completed());
    let inner_done = journal.index_of("inner-b", OperationEvent::Ended).expect("inner-b ended");
    let after_started = journal.index_of("after", OperationEvent::Started).expect("after started");
    assert!(inner_done < after_started);
    Ok(())
}

#[test]
fn test_hooks_bracket_every_child() -> TestResult {
    let seq = OperationSequence::new("hooks");
    let a = instant("A");
    let b = instant("B");
    seq.operation(&b).depends_on(&a)?;
    let hooks = RecordingHooks::default();
    seq.set_hooks(Arc::new(hooks.clone()))?;

    seq.run();

    assert_eq!(hooks.calls(), vec!["start:A", "finish:A", "start:B", "finish:B"]);
    Ok(())
}

#[test]
fn test_operations_and_dependencies_are_queryable() -> TestResult {
    let seq = OperationSequence::new("query");
    let a = instant("A");
    let b = instant("B");
    seq.append(&a)?;
    seq.append(&a)?;
    seq.operation(&b).depends_on(&a)?;

    let names: Vec<String> = seq.operations().iter().map(|op| op.name().to_string()).collect();
    assert_eq!(names, vec!["A", "B"]);
    let deps = seq.dependencies_of(&b);
    assert_eq!(deps.len(), 1);
    assert!(deps[0].ptr_eq(&a));
    Ok(())
}
