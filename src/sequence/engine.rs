// src/sequence/engine.rs

//! Composite operation that runs a dependency graph of child operations.
//!
//! A run computes the dependency partitions once, then walks them in level
//! order. Inside a partition the children run one at a time
//! (`SchedulingMode::Sequential`) or all at once on scoped threads
//! (`SchedulingMode::Parallel`). Every partition gets its own cancellation
//! token, a child of the sequence's run token, and every child runs with a
//! child of that partition token. Aborting a partition cancels its token, so
//! siblings that have not reached `run` yet start already cancelled.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dag::{ByReference, DependencyGraph, DependencyPartition};
use crate::errors::{ChildFailure, OperationError, OpgraphError, Result};
use crate::operation::{ExecutionResult, Operation, OperationEvent, RunContext, Work};
use crate::sequence::hooks::{ErrorSink, NoHooks, SequenceHooks, TracingErrorSink};
use crate::sequence::progress::{DetailProgress, ProgressRecord};
use crate::types::{DispatchMode, ErrorBehavior, SchedulingMode};

type OperationGraph = DependencyGraph<Operation, ByReference>;

/// Structure and policy. Frozen while the sequence runs.
struct SequenceConfig {
    graph: OperationGraph,
    scheduling: SchedulingMode,
    error_behavior: ErrorBehavior,
    sink: Arc<dyn ErrorSink>,
    hooks: Arc<dyn SequenceHooks>,
    /// Restrict runs to these operations plus their dependencies.
    targets: Option<Vec<Operation>>,
    running: bool,
}

/// Children currently running plus the detail progress map. Mutated from
/// every worker thread of a parallel partition, always under one lock.
#[derive(Default)]
struct SequenceTracking {
    running: Vec<Operation>,
    detail: DetailProgress,
}

struct SequenceCore {
    name: String,
    config: Mutex<SequenceConfig>,
    tracking: Mutex<SequenceTracking>,
}

impl SequenceCore {
    fn config(&self) -> MutexGuard<'_, SequenceConfig> {
        self.config.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tracking(&self) -> MutexGuard<'_, SequenceTracking> {
        self.tracking.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn running_children(&self) -> Vec<Operation> {
        self.tracking().running.clone()
    }

    fn track(&self, op: &Operation) {
        self.tracking().running.push(op.clone());
    }

    fn untrack(&self, op: &Operation) {
        self.tracking().running.retain(|r| !r.ptr_eq(op));
    }

    fn update_detail(&self, op: &Operation, f: impl FnOnce(&mut ProgressRecord)) {
        self.tracking().detail.update(op.id(), f);
    }

    fn mark_skipped(&self, op: &Operation) {
        debug!(sequence = %self.name, operation = %op.name(), "skipping operation after abort");
        self.update_detail(op, |r| {
            r.is_aborted = true;
            r.is_completed = true;
            r.is_initializing = false;
        });
    }
}

/// The `Work` behind a sequence's own `Operation`.
struct SequenceWork {
    core: Arc<SequenceCore>,
}

impl Work for SequenceWork {
    fn initialize(&self, _ctx: &RunContext) -> std::result::Result<(), OperationError> {
        self.core.config().running = true;
        Ok(())
    }

    fn execute(&self, ctx: &RunContext) -> std::result::Result<(), OperationError> {
        execute_sequence(&self.core, ctx)
    }

    fn cleanup(&self, _was_cancelled: bool) {
        self.core.tracking().running.clear();
        self.core.config().running = false;
    }

    fn cancelling(&self) {
        for child in self.core.running_children() {
            child.cancel();
        }
    }

    fn cancelled(&self) {
        self.core.tracking().running.clear();
    }
}

/// Everything one run of a sequence needs, shared by its worker threads.
struct SequenceRun<'a> {
    core: &'a Arc<SequenceCore>,
    ctx: &'a RunContext,
    error_behavior: ErrorBehavior,
    sink: Arc<dyn ErrorSink>,
    hooks: Arc<dyn SequenceHooks>,
    partition_count: usize,
    aborted: AtomicBool,
    failures: Mutex<Vec<ChildFailure>>,
}

fn execute_sequence(
    core: &Arc<SequenceCore>,
    ctx: &RunContext,
) -> std::result::Result<(), OperationError> {
    let (partitions, scheduling, error_behavior, sink, hooks) = {
        let cfg = core.config();
        let subset = cfg
            .targets
            .as_ref()
            .map(|targets| cfg.graph.dependency_closure(targets));
        let partitions = cfg.graph.partitions_by_dependency_depth(subset.as_deref())?;
        (
            partitions,
            cfg.scheduling,
            cfg.error_behavior,
            Arc::clone(&cfg.sink),
            Arc::clone(&cfg.hooks),
        )
    };

    {
        let mut tracking = core.tracking();
        tracking.detail.clear();
        for child in partitions.iter().flat_map(DependencyPartition::iter) {
            tracking.detail.insert(child.id(), ProgressRecord::idle(child.name()));
        }
    }

    info!(
        sequence = %core.name,
        partitions = partitions.len(),
        ?scheduling,
        ?error_behavior,
        "running operation sequence"
    );

    let run = SequenceRun {
        core,
        ctx,
        error_behavior,
        sink,
        hooks,
        partition_count: partitions.len(),
        aborted: AtomicBool::new(false),
        failures: Mutex::new(Vec::new()),
    };

    for (index, partition) in partitions.iter().enumerate() {
        if run.should_stop() {
            partition.iter().for_each(|op| core.mark_skipped(op));
            continue;
        }

        debug!(
            sequence = %core.name,
            level = partition.level(),
            size = partition.len(),
            "starting partition"
        );
        let partition_token = ctx.token().child_token();
        match scheduling {
            SchedulingMode::Sequential => run.run_sequential(index, partition, &partition_token),
            SchedulingMode::Parallel => run.run_parallel(index, partition, &partition_token),
        }

        if !run.should_stop() {
            ctx.set_progress((index + 1) as f64 / run.partition_count as f64);
        }
    }

    let failures = run
        .failures
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    ExecutionResult::composite(failures).into_result()
}

impl SequenceRun<'_> {
    fn should_stop(&self) -> bool {
        self.aborted.load(Ordering::SeqCst) || self.ctx.is_cancelled()
    }

    fn run_sequential(
        &self,
        index: usize,
        partition: &DependencyPartition<Operation>,
        token: &CancellationToken,
    ) {
        let size = partition.len() as f64;
        let total = self.partition_count as f64;

        for (position, child) in partition.iter().enumerate() {
            if self.should_stop() {
                self.core.mark_skipped(child);
                continue;
            }
            let base = (index as f64 + position as f64 / size) / total;
            let span = 1.0 / (size * total);
            self.run_child(child, token, Some((base, span)));
        }
    }

    fn run_parallel(
        &self,
        index: usize,
        partition: &DependencyPartition<Operation>,
        token: &CancellationToken,
    ) {
        let size = partition.len() as f64;
        let total = self.partition_count as f64;
        let finished = AtomicUsize::new(0);

        thread::scope(|scope| {
            for child in partition.iter() {
                let finished = &finished;
                scope.spawn(move || {
                    if self.should_stop() {
                        self.core.mark_skipped(child);
                        return;
                    }
                    self.run_child(child, token, None);
                    let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    self.ctx
                        .set_progress((index as f64 + done as f64 / size) / total);
                });
            }
        });
    }

    /// Run one child to completion and apply the error behavior to its
    /// result. `blend` maps the child's progress onto the sequence's
    /// progress as `base + span * p`.
    fn run_child(&self, child: &Operation, token: &CancellationToken, blend: Option<(f64, f64)>) {
        self.core.update_detail(child, |r| {
            r.is_idle = false;
            r.is_initializing = true;
        });

        let core = Arc::clone(self.core);
        let ctx = self.ctx.clone();
        let subscription = child.subscribe(move |op, event| match event {
            OperationEvent::Started => core.update_detail(op, |r| r.is_initializing = false),
            OperationEvent::ProgressChanged(p) => {
                let p = *p;
                core.update_detail(op, |r| r.progress = p);
                if let Some((base, span)) = blend {
                    ctx.set_progress(base + span * p);
                }
            }
            OperationEvent::Ended => {}
        });

        self.hooks.start_operation(child);
        self.core.track(child);

        let ran = panic::catch_unwind(AssertUnwindSafe(|| {
            child.run_with(token);
            child.wait();
        }));
        if ran.is_err() {
            warn!(
                sequence = %self.core.name,
                operation = %child.name(),
                "child operation propagated a panic"
            );
        }

        self.core.untrack(child);
        self.hooks.finish_operation(child);
        child.unsubscribe(subscription);

        let result = child.execution_result();
        let cancelled = child.was_cancelled();
        let progress = child.progress();
        self.core.update_detail(child, |r| {
            r.progress = progress;
            r.is_initializing = false;
            r.is_aborted = result.has_error();
            r.is_completed = true;
        });

        self.react(child, &result, cancelled, token);
    }

    fn react(
        &self,
        child: &Operation,
        result: &ExecutionResult,
        cancelled: bool,
        token: &CancellationToken,
    ) {
        let Some(error) = result.error() else {
            return;
        };

        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ChildFailure {
                operation: child.name().to_string(),
                error: error.clone(),
            });

        if self.error_behavior > ErrorBehavior::Ignore && !cancelled {
            self.sink.error(&format!(
                "operation '{}' in sequence '{}' failed: {}",
                child.name(),
                self.core.name,
                error
            ));
        }

        if self.error_behavior == ErrorBehavior::Abort {
            self.abort_partition(child, token);
        }
    }

    /// Cancel every sibling still running in this partition and stop the
    /// remaining partitions from starting.
    fn abort_partition(&self, failed: &Operation, token: &CancellationToken) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            info!(
                sequence = %self.core.name,
                operation = %failed.name(),
                "aborting sequence after child failure"
            );
        }
        token.cancel();
        for sibling in self.core.running_children() {
            if !sibling.ptr_eq(failed) {
                sibling.cancel();
            }
        }
    }
}

/// A composite operation over a dependency graph of child operations.
///
/// Clones share the same graph and run state. The sequence is itself an
/// [`Operation`] (see [`as_operation`](Self::as_operation)), so sequences can
/// be nested inside other sequences.
#[derive(Clone)]
pub struct OperationSequence {
    operation: Operation,
    core: Arc<SequenceCore>,
}

/// Fluent dependency declaration returned by [`OperationSequence::operation`].
pub struct DependencyBuilder<'a> {
    sequence: &'a OperationSequence,
    operation: Operation,
}

impl DependencyBuilder<'_> {
    /// Declare that this operation must follow `other`.
    ///
    /// Both operations are registered if needed. Fails on self dependencies
    /// and on edges that would close a cycle.
    pub fn depends_on(self, other: &Operation) -> Result<Self> {
        {
            let mut cfg = self.sequence.mutable_config("dependencies")?;
            if !self.operation.ptr_eq(other)
                && cfg.graph.would_create_cycle(&self.operation, other)
            {
                return Err(OpgraphError::DependencyCycle(format!(
                    "'{}' depending on '{}' would close a cycle",
                    self.operation.name(),
                    other.name()
                )));
            }
            cfg.graph
                .setup_dependency(self.operation.clone(), other.clone())?;
        }
        Ok(self)
    }
}

impl OperationSequence {
    /// Synchronously dispatched sequence.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_dispatch(name, DispatchMode::Synchronous)
    }

    pub fn with_dispatch(name: impl Into<String>, dispatch: DispatchMode) -> Self {
        let name = name.into();
        let core = Arc::new(SequenceCore {
            name: name.clone(),
            config: Mutex::new(SequenceConfig {
                graph: OperationGraph::new(),
                scheduling: SchedulingMode::default(),
                error_behavior: ErrorBehavior::default(),
                sink: Arc::new(TracingErrorSink),
                hooks: Arc::new(NoHooks),
                targets: None,
                running: false,
            }),
            tracking: Mutex::new(SequenceTracking::default()),
        });
        let operation = Operation::builder(
            name,
            SequenceWork {
                core: Arc::clone(&core),
            },
        )
        .dispatch(dispatch)
        .build();

        Self { operation, core }
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The sequence as a plain operation, e.g. to append it to another
    /// sequence or to subscribe to its events.
    pub fn as_operation(&self) -> &Operation {
        &self.operation
    }

    pub fn into_operation(self) -> Operation {
        self.operation
    }

    // ---- construction -----------------------------------------------------

    pub fn append(&self, op: &Operation) -> Result<()> {
        self.mutable_config("operations")?.graph.register(op.clone());
        Ok(())
    }

    /// Start a dependency declaration for `op`: `seq.operation(&a).depends_on(&b)?`.
    pub fn operation(&self, op: &Operation) -> DependencyBuilder<'_> {
        DependencyBuilder {
            sequence: self,
            operation: op.clone(),
        }
    }

    pub fn scheduling_mode(&self) -> SchedulingMode {
        self.core.config().scheduling
    }

    pub fn set_scheduling_mode(&self, mode: SchedulingMode) -> Result<()> {
        self.mutable_config("scheduling mode")?.scheduling = mode;
        Ok(())
    }

    pub fn error_behavior(&self) -> ErrorBehavior {
        self.core.config().error_behavior
    }

    pub fn set_error_behavior(&self, behavior: ErrorBehavior) -> Result<()> {
        self.mutable_config("error behavior")?.error_behavior = behavior;
        Ok(())
    }

    pub fn set_error_sink(&self, sink: Arc<dyn ErrorSink>) -> Result<()> {
        self.mutable_config("error sink")?.sink = sink;
        Ok(())
    }

    pub fn set_hooks(&self, hooks: Arc<dyn SequenceHooks>) -> Result<()> {
        self.mutable_config("hooks")?.hooks = hooks;
        Ok(())
    }

    /// Only run `targets` and what they transitively depend on. `None`
    /// runs every registered operation.
    pub fn set_targets(&self, targets: Option<Vec<Operation>>) -> Result<()> {
        self.mutable_config("targets")?.targets = targets;
        Ok(())
    }

    /// Registered operations, in registration order.
    pub fn operations(&self) -> Vec<Operation> {
        self.core.config().graph.known_elements().cloned().collect()
    }

    /// What `op` directly depends on inside this sequence.
    pub fn dependencies_of(&self, op: &Operation) -> Vec<Operation> {
        self.core.config().graph.dependencies_of(op).cloned().collect()
    }

    /// The partitions the next run will execute, honoring the targets.
    pub fn partitions(&self) -> Result<Vec<DependencyPartition<Operation>>> {
        let cfg = self.core.config();
        let subset = cfg
            .targets
            .as_ref()
            .map(|targets| cfg.graph.dependency_closure(targets));
        cfg.graph.partitions_by_dependency_depth(subset.as_deref())
    }

    /// One progress record per child of the current (or last) run.
    pub fn detail_progress(&self) -> Vec<ProgressRecord> {
        self.core.tracking().detail.snapshot()
    }

    // ---- control (delegates to the sequence's operation) ------------------

    pub fn run(&self) {
        self.operation.run();
    }

    pub fn run_with(&self, parent: &CancellationToken) {
        self.operation.run_with(parent);
    }

    pub fn cancel(&self) {
        self.operation.cancel();
    }

    pub fn wait(&self) {
        self.operation.wait();
    }

    pub fn wait_for_started(&self) {
        self.operation.wait_for_started();
    }

    pub fn wait_for_ended(&self) {
        self.operation.wait_for_ended();
    }

    pub fn progress(&self) -> f64 {
        self.operation.progress()
    }

    pub fn execution_result(&self) -> ExecutionResult {
        self.operation.execution_result()
    }

    pub fn is_running(&self) -> bool {
        self.operation.is_running()
    }

    pub fn was_cancelled(&self) -> bool {
        self.operation.was_cancelled()
    }

    pub fn is_completed(&self) -> bool {
        self.operation.is_completed()
    }

    fn mutable_config(&self, what: &str) -> Result<MutexGuard<'_, SequenceConfig>> {
        let cfg = self.core.config();
        if cfg.running || self.operation.is_running() {
            return Err(OpgraphError::ModifiedWhileRunning(format!(
                "{} ({what})",
                self.core.name
            )));
        }
        Ok(cfg)
    }
}

impl std::fmt::Debug for OperationSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationSequence")
            .field("name", &self.core.name)
            .finish_non_exhaustive()
    }
}
