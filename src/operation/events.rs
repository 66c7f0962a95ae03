// src/operation/events.rs

//! Instance-scoped notifications raised by an [`Operation`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::operation::Operation;

/// Notification raised by an operation while it runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperationEvent {
    /// Initialization succeeded and the operation entered `Running`.
    Started,
    /// The run is over and cleanup has finished. Raised before waiters are
    /// released.
    Ended,
    /// Progress was reported. Raised on every report, even when the value
    /// did not move.
    ProgressChanged(f64),
}

/// Handle returned by [`Operation::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub(crate) type EventHandler = Arc<dyn Fn(&Operation, &OperationEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(SubscriptionId, EventHandler)>>,
}

impl Subscribers {
    pub(crate) fn add(&self, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    /// Handlers are invoked outside the lock so they may (un)subscribe.
    pub(crate) fn snapshot(&self) -> Vec<EventHandler> {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }
}
