//! Fan-out of live events to registered handlers.
//!
//! Handlers run synchronously on the task that emits. A handler that
//! returns an error or panics is logged and skipped; the remaining
//! handlers still run and nothing reaches the emitter.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::events::{EventKind, LiveEvent};

/// Error a handler may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A registered callback. Identity is the `Arc` allocation.
pub type Handler = Arc<dyn Fn(&LiveEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Wrap a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&LiveEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Outcome of one [`EventDispatcher::emit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Handlers that returned `Ok`.
    pub delivered: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

/// Registry of handlers keyed by event kind.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    handlers: Arc<Mutex<HashMap<EventKind, Vec<Handler>>>>,
}

impl EventDispatcher {
    /// Create an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`.
    ///
    /// Registering the same handler twice makes it run twice per event.
    pub fn on(&self, kind: EventKind, handler: Handler) {
        self.handlers.lock().entry(kind).or_default().push(handler);
    }

    /// Remove one registration of `handler` for `kind`.
    ///
    /// Returns `false` if it was not registered.
    pub fn off(&self, kind: EventKind, handler: &Handler) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(list) = handlers.get_mut(&kind) else {
            return false;
        };
        let Some(index) = list.iter().position(|h| Arc::ptr_eq(h, handler)) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            handlers.remove(&kind);
        }
        true
    }

    /// Number of registrations for `kind`.
    #[must_use]
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Drop every registration.
    pub fn clear(&self) {
        self.handlers.lock().clear();
    }

    /// Deliver `event` to every handler registered for its kind, in
    /// registration order.
    ///
    /// The handler list is snapshotted first, so handlers may register or
    /// remove handlers without affecting this delivery.
    pub fn emit(&self, event: &LiveEvent) -> DispatchOutcome {
        let kind = event.kind();
        let snapshot: Vec<Handler> = self
            .handlers
            .lock()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut outcome = DispatchOutcome::default();
        for handler in &snapshot {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => outcome.delivered += 1,
                Ok(Err(e)) => {
                    error!(event = %kind, error = %e, "event handler failed");
                    outcome.failed += 1;
                }
                Err(panic) => {
                    error!(event = %kind, panic = panic_message(&*panic), "event handler panicked");
                    outcome.failed += 1;
                }
            }
        }
        trace!(event = %kind, delivered = outcome.delivered, failed = outcome.failed, "event dispatched");
        outcome
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.lock();
        let counts: HashMap<&'static str, usize> = handlers
            .iter()
            .map(|(kind, list)| (kind.name(), list.len()))
            .collect();
        f.debug_struct("EventDispatcher")
            .field("handlers", &counts)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
