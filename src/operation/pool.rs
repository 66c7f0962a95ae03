// src/operation/pool.rs

//! Shared worker pool for [`DispatchMode::ThreadPool`] operations.
//!
//! The pool is the blocking-thread pool of one process-wide multi-thread
//! Tokio runtime, built on first use. Command operations also drive their
//! child processes on this runtime.
//!
//! [`DispatchMode::ThreadPool`]: crate::types::DispatchMode::ThreadPool

use std::sync::OnceLock;

use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use crate::errors::OperationError;

static POOL: OnceLock<std::io::Result<Runtime>> = OnceLock::new();

pub fn worker_pool() -> Result<&'static Runtime, OperationError> {
    POOL.get_or_init(|| {
        debug!("building shared worker pool");
        Builder::new_multi_thread()
            .thread_name("opgraph-pool")
            .enable_all()
            .build()
    })
    .as_ref()
    .map_err(|err| OperationError::failed(format!("building worker pool: {err}")))
}
