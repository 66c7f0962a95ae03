// src/sequence/mod.rs

//! Operation sequences: composite operations over a dependency graph.
//!
//! - [`engine`] holds `OperationSequence`, its fluent dependency builder and
//!   the partition-by-partition run loop.
//! - [`progress`] holds the per-child "detail progress" records.
//! - [`hooks`] defines the error sink and instrumentation collaborators.

pub mod engine;
pub mod hooks;
pub mod progress;

pub use engine::{DependencyBuilder, OperationSequence};
pub use hooks::{ErrorSink, NoHooks, SequenceHooks, TracingErrorSink};
pub use progress::ProgressRecord;
