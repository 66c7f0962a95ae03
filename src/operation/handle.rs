// src/operation/handle.rs

//! The operation run engine.
//!
//! [`Operation`] is a cheap, clonable handle. All clones share one state
//! machine (`Idle -> Initializing -> Running -> Completed | Aborted`), one
//! set of subscribers and one [`Work`]. State is guarded by a per-instance
//! mutex with a condition variable, so another thread can poll or wait on
//! an operation while it runs.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dag::identity::{ByReference, NodeIdentity};
use crate::errors::{OperationError, OpgraphError, Result};
use crate::operation::context::RunContext;
use crate::operation::events::{OperationEvent, Subscribers, SubscriptionId};
use crate::operation::exception::{
    ExceptionHandler, ExceptionPolicy, LifecyclePhase, ThreadException,
};
use crate::operation::pool::worker_pool;
use crate::operation::result::ExecutionResult;
use crate::operation::work::{FnWork, Work};
use crate::types::{DispatchMode, OperationState};

/// Mutable per-instance state. Only touched under `OperationInner::state`.
#[derive(Debug)]
struct RunState {
    state: OperationState,
    dispatch: DispatchMode,
    progress: f64,
    result: ExecutionResult,
    was_cancelled: bool,
    is_completed: bool,
    /// A run was requested and has not ended yet.
    active: bool,
    /// The lifecycle of the active run has begun executing on its thread.
    lifecycle_started: bool,
    token: Option<CancellationToken>,
    runner: Option<ThreadId>,
    run_count: u64,
}

impl RunState {
    fn new(dispatch: DispatchMode) -> Self {
        Self {
            state: OperationState::Idle,
            dispatch,
            progress: 0.0,
            result: ExecutionResult::success(),
            was_cancelled: false,
            is_completed: false,
            active: false,
            lifecycle_started: false,
            token: None,
            runner: None,
            run_count: 0,
        }
    }
}

struct OperationInner {
    name: String,
    work: Box<dyn Work>,
    state: Mutex<RunState>,
    changed: Condvar,
    subscribers: Subscribers,
    exception_handlers: Mutex<Vec<ExceptionHandler>>,
    exception_policy: Option<Arc<dyn ExceptionPolicy>>,
}

/// A unit of work with a lifecycle, progress and cooperative cancellation.
#[derive(Clone)]
pub struct Operation {
    inner: Arc<OperationInner>,
}

/// Builder for operations that need more than the defaults.
pub struct OperationBuilder {
    name: String,
    work: Box<dyn Work>,
    dispatch: DispatchMode,
    exception_policy: Option<Arc<dyn ExceptionPolicy>>,
}

impl OperationBuilder {
    pub fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.dispatch = mode;
        self
    }

    /// Last-chance handler for panics no instance handler claimed.
    pub fn exception_policy(mut self, policy: Arc<dyn ExceptionPolicy>) -> Self {
        self.exception_policy = Some(policy);
        self
    }

    pub fn build(self) -> Operation {
        Operation {
            inner: Arc::new(OperationInner {
                name: self.name,
                work: self.work,
                state: Mutex::new(RunState::new(self.dispatch)),
                changed: Condvar::new(),
                subscribers: Subscribers::default(),
                exception_handlers: Mutex::new(Vec::new()),
                exception_policy: self.exception_policy,
            }),
        }
    }
}

impl Operation {
    /// Synchronous operation around `work`.
    pub fn new(name: impl Into<String>, work: impl Work) -> Self {
        Self::builder(name, work).build()
    }

    pub fn builder(name: impl Into<String>, work: impl Work) -> OperationBuilder {
        OperationBuilder {
            name: name.into(),
            work: Box::new(work),
            dispatch: DispatchMode::default(),
            exception_policy: None,
        }
    }

    /// Relay operation that runs `f` as its `execute` hook.
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&RunContext) -> std::result::Result<(), OperationError> + Send + Sync + 'static,
    {
        Self::new(name, FnWork::new(f))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Identity of the underlying instance; equal for all clones.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.inner).cast::<()>() as usize
    }

    pub fn ptr_eq(&self, other: &Operation) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ---- observation ------------------------------------------------------

    pub fn state(&self) -> OperationState {
        self.lock().state
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.lock().dispatch
    }

    pub fn progress(&self) -> f64 {
        self.lock().progress
    }

    pub fn execution_result(&self) -> ExecutionResult {
        self.lock().result.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().active
    }

    pub fn is_initializing(&self) -> bool {
        self.lock().state == OperationState::Initializing
    }

    pub fn was_cancelled(&self) -> bool {
        self.lock().was_cancelled
    }

    pub fn is_completed(&self) -> bool {
        self.lock().is_completed
    }

    /// Number of runs requested so far.
    pub fn run_count(&self) -> u64 {
        self.lock().run_count
    }

    // ---- configuration ----------------------------------------------------

    /// Change the dispatch mode. Fails while a run is active.
    pub fn set_dispatch_mode(&self, mode: DispatchMode) -> Result<()> {
        let mut st = self.lock();
        if st.active {
            return Err(OpgraphError::ModifiedWhileRunning(format!(
                "{} (dispatch mode)",
                self.inner.name
            )));
        }
        st.dispatch = mode;
        Ok(())
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Operation, &OperationEvent) + Send + Sync + 'static,
    {
        self.inner.subscribers.add(Arc::new(handler))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.remove(id)
    }

    /// Instance-level panic handler. Return `true` to mark a panic handled.
    pub fn on_thread_exception<F>(&self, handler: F)
    where
        F: Fn(&ThreadException) -> bool + Send + Sync + 'static,
    {
        self.inner
            .exception_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    // ---- control ----------------------------------------------------------

    /// Start a run with a fresh cancellation token.
    ///
    /// Any in-flight run is cancelled and waited out first. Synchronous
    /// operations return once the run is over; the other dispatch modes
    /// return once the lifecycle has started on its thread. Called from the
    /// in-flight run's own thread (a hook or an event subscriber) it logs a
    /// warning and does nothing.
    pub fn run(&self) {
        self.start(None);
    }

    /// Like [`run`](Self::run), but the run's token is a child of `parent`,
    /// so cancelling `parent` cancels this run too.
    pub fn run_with(&self, parent: &CancellationToken) {
        self.start(Some(parent));
    }

    /// Request cancellation and block until the run has stopped.
    ///
    /// Called from the run's own thread it only issues the request.
    pub fn cancel(&self) {
        let (token, runner) = {
            let st = self.lock();
            if !st.active {
                return;
            }
            (st.token.clone(), st.runner)
        };

        info!(operation = %self.inner.name, "cancellation requested");
        if let Some(token) = token {
            token.cancel();
        }
        self.inner.work.cancelling();

        if runner != Some(thread::current().id()) {
            self.wait_for_ended();
        }
        self.inner.work.cancelled();
    }

    /// Block until the current run has started and then ended.
    ///
    /// A no-op for synchronous operations, whose `run` already blocks.
    pub fn wait(&self) {
        if self.dispatch_mode() == DispatchMode::Synchronous {
            return;
        }
        self.wait_for_started();
        self.wait_for_ended();
    }

    pub fn wait_for_started(&self) {
        let st = self.lock();
        let _st = self
            .inner
            .changed
            .wait_while(st, |s| s.active && !s.lifecycle_started)
            .unwrap_or_else(PoisonError::into_inner);
    }

    pub fn wait_for_ended(&self) {
        let st = self.lock();
        let _st = self
            .inner
            .changed
            .wait_while(st, |s| s.active)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Report progress.
    ///
    /// The value is clamped to `[0, 1]` and never moves backwards within a
    /// run. `ProgressChanged` is raised on every call.
    pub fn set_progress(&self, value: f64) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let current = {
            let mut st = self.lock();
            st.progress = st.progress.max(value);
            st.progress
        };
        self.emit(OperationEvent::ProgressChanged(current));
    }

    // ---- engine -----------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, RunState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self, parent: Option<&CancellationToken>) {
        let (token, dispatch) = loop {
            let mut st = self.lock();
            if st.active {
                // The in-flight run cannot be waited out from its own thread.
                if st.runner == Some(thread::current().id()) {
                    warn!(
                        operation = %self.inner.name,
                        "run requested from the operation's own thread; ignoring"
                    );
                    return;
                }
                drop(st);
                debug!(operation = %self.inner.name, "superseding in-flight run");
                self.cancel();
                continue;
            }
            let token = parent.map_or_else(CancellationToken::new, CancellationToken::child_token);
            st.active = true;
            st.lifecycle_started = false;
            st.progress = 0.0;
            st.result = ExecutionResult::success();
            st.was_cancelled = false;
            st.is_completed = false;
            st.token = Some(token.clone());
            st.run_count += 1;
            break (token, st.dispatch);
        };

        debug!(operation = %self.inner.name, ?dispatch, "dispatching run");

        match dispatch {
            DispatchMode::Synchronous => self.execute_lifecycle(token),
            DispatchMode::BackgroundThread => {
                let op = self.clone();
                let spawned = thread::Builder::new()
                    .name(format!("opgraph:{}", self.inner.name))
                    .spawn(move || op.execute_lifecycle(token));
                match spawned {
                    Ok(_) => self.wait_for_started(),
                    Err(err) => self.fail_dispatch(OperationError::failed(format!(
                        "spawning background thread: {err}"
                    ))),
                }
            }
            DispatchMode::ThreadPool => match worker_pool() {
                Ok(pool) => {
                    let op = self.clone();
                    drop(pool.spawn_blocking(move || op.execute_lifecycle(token)));
                    self.wait_for_started();
                }
                Err(err) => self.fail_dispatch(err),
            },
        }
    }

    /// End a run whose lifecycle could never be scheduled.
    fn fail_dispatch(&self, err: OperationError) {
        error!(operation = %self.inner.name, error = %err, "failed to dispatch operation");
        {
            let mut st = self.lock();
            st.result = ExecutionResult::from_error(err);
            st.is_completed = true;
            st.state = OperationState::Aborted;
        }
        self.run_cleanup(false);
        self.emit(OperationEvent::Ended);
        self.finish_run();
    }

    fn execute_lifecycle(&self, token: CancellationToken) {
        {
            let mut st = self.lock();
            st.lifecycle_started = true;
            st.state = OperationState::Initializing;
            st.runner = Some(thread::current().id());
        }
        self.inner.changed.notify_all();
        debug!(operation = %self.inner.name, "initializing");

        let ctx = RunContext::new(self.clone(), token.clone());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.drive_hooks(&ctx)));
        let cancelled_in_flight = token.is_cancelled();

        let mut unhandled: Option<Box<dyn Any + Send>> = None;
        let outcome = match outcome {
            Ok(res) => res,
            Err(payload) => {
                let phase = if self.state() == OperationState::Initializing {
                    LifecyclePhase::Initialize
                } else {
                    LifecyclePhase::Execute
                };
                let exception = ThreadException::from_panic(&self.inner.name, phase, &*payload);
                let message = exception.message.clone();
                if !self.handle_exception(&exception) {
                    unhandled = Some(payload);
                }
                Err(OperationError::Panicked(message))
            }
        };

        let cancelled =
            cancelled_in_flight || matches!(outcome, Err(OperationError::Cancelled));
        let result = if cancelled {
            ExecutionResult::cancelled()
        } else {
            ExecutionResult::from(outcome)
        };

        if !result.has_error() {
            self.set_progress(1.0);
        }

        self.run_cleanup(cancelled);

        match result.error() {
            None => info!(operation = %self.inner.name, "operation completed"),
            Some(_) if cancelled => info!(operation = %self.inner.name, "operation cancelled"),
            Some(err) => warn!(operation = %self.inner.name, error = %err, "operation failed"),
        }

        {
            let mut st = self.lock();
            st.state = if result.has_error() {
                OperationState::Aborted
            } else {
                OperationState::Completed
            };
            st.was_cancelled = cancelled;
            st.is_completed = true;
            st.result = result;
        }
        self.emit(OperationEvent::Ended);
        self.finish_run();

        if let Some(payload) = unhandled {
            error!(operation = %self.inner.name, "unhandled panic in operation; propagating");
            panic::resume_unwind(payload);
        }
    }

    fn drive_hooks(&self, ctx: &RunContext) -> std::result::Result<(), OperationError> {
        self.inner.work.initialize(ctx)?;
        ctx.check_cancelled()?;

        self.lock().state = OperationState::Running;
        debug!(operation = %self.inner.name, "running");
        self.emit(OperationEvent::Started);

        self.inner.work.execute(ctx)
    }

    fn run_cleanup(&self, cancelled: bool) {
        if panic::catch_unwind(AssertUnwindSafe(|| self.inner.work.cleanup(cancelled))).is_err() {
            warn!(operation = %self.inner.name, "cleanup panicked; ignoring");
        }
    }

    /// Release waiters and drop the run's token.
    fn finish_run(&self) {
        {
            let mut st = self.lock();
            st.active = false;
            st.lifecycle_started = false;
            st.token = None;
            st.runner = None;
        }
        self.inner.changed.notify_all();
    }

    fn emit(&self, event: OperationEvent) {
        for handler in self.inner.subscribers.snapshot() {
            let delivered = panic::catch_unwind(AssertUnwindSafe(|| handler(self, &event)));
            if let Err(payload) = delivered {
                let exception = ThreadException::from_panic(
                    &self.inner.name,
                    LifecyclePhase::Notification,
                    &*payload,
                );
                if !self.handle_exception(&exception) {
                    error!(
                        operation = %self.inner.name,
                        ?event,
                        message = %exception.message,
                        "event subscriber panicked"
                    );
                }
            }
        }
    }

    fn handle_exception(&self, exception: &ThreadException) -> bool {
        let handlers: Vec<ExceptionHandler> = self
            .inner
            .exception_handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for handler in handlers {
            let handled = panic::catch_unwind(AssertUnwindSafe(|| handler(exception)));
            if handled.unwrap_or(false) {
                return true;
            }
        }

        self.inner
            .exception_policy
            .as_ref()
            .is_some_and(|policy| policy.handle(exception))
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Operation").field(&self.inner.name).finish()
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

impl NodeIdentity<Operation> for ByReference {
    type Key = usize;

    fn key_of(node: &Operation) -> usize {
        node.id()
    }
}
