// src/operation/mod.rs

//! Units of work and the engine that runs them.
//!
//! - [`work`] defines the lifecycle hooks (`Work`) and a closure relay.
//! - [`handle`] holds the `Operation` handle and its run state machine.
//! - [`context`] is the per-run view passed to hooks.
//! - [`events`] carries Started / Ended / ProgressChanged notifications.
//! - [`exception`] routes panics from hooks and subscribers.
//! - [`result`] holds `ExecutionResult`.
//! - [`pool`] owns the shared worker pool used by `DispatchMode::ThreadPool`.

pub mod context;
pub mod events;
pub mod exception;
pub mod handle;
pub mod pool;
pub mod result;
pub mod work;

pub use context::RunContext;
pub use events::{OperationEvent, SubscriptionId};
pub use exception::{ContainPanics, ExceptionPolicy, LifecyclePhase, PropagatePanics, ThreadException};
pub use handle::{Operation, OperationBuilder};
pub use result::ExecutionResult;
pub use work::{FnWork, Work};
