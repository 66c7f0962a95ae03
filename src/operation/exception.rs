// src/operation/exception.rs

//! Panic routing for operation lifecycles.
//!
//! A panic raised by a lifecycle hook or an event subscriber becomes a
//! [`ThreadException`]. It is offered first to the operation's own handlers
//! (see [`Operation::on_thread_exception`]) and then to the
//! [`ExceptionPolicy`] the operation was built with. If nobody marks it
//! handled, a lifecycle panic is re-raised once cleanup has run.
//!
//! [`Operation::on_thread_exception`]: crate::operation::Operation::on_thread_exception

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::error;

/// Where a captured panic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Initialize,
    Execute,
    /// An event subscriber panicked while being notified.
    Notification,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecyclePhase::Initialize => "initialize",
            LifecyclePhase::Execute => "execute",
            LifecyclePhase::Notification => "notification",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ThreadException {
    pub operation: String,
    pub phase: LifecyclePhase,
    pub message: String,
}

impl ThreadException {
    pub(crate) fn from_panic(
        operation: &str,
        phase: LifecyclePhase,
        payload: &(dyn Any + Send),
    ) -> Self {
        Self {
            operation: operation.to_string(),
            phase,
            message: panic_message(payload),
        }
    }
}

impl fmt::Display for ThreadException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation '{}' panicked during {}: {}",
            self.operation, self.phase, self.message
        )
    }
}

/// Process-level last chance to handle a captured panic.
///
/// Installed per operation via
/// [`OperationBuilder::exception_policy`](crate::operation::OperationBuilder::exception_policy),
/// usually sharing one `Arc` across the whole program.
pub trait ExceptionPolicy: Send + Sync {
    /// Return `true` to mark the exception handled.
    fn handle(&self, exception: &ThreadException) -> bool;
}

/// Never handles anything: unhandled lifecycle panics propagate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagatePanics;

impl ExceptionPolicy for PropagatePanics {
    fn handle(&self, _exception: &ThreadException) -> bool {
        false
    }
}

/// Logs every panic and marks it handled.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainPanics;

impl ExceptionPolicy for ContainPanics {
    fn handle(&self, exception: &ThreadException) -> bool {
        error!(
            operation = %exception.operation,
            phase = %exception.phase,
            message = %exception.message,
            "contained panic in operation"
        );
        true
    }
}

pub(crate) type ExceptionHandler = Arc<dyn Fn(&ThreadException) -> bool + Send + Sync>;

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
