//! Copy-on-write handler storage for a single event type.

use crate::liveness::{LivenessCheck, LivenessGate};
use crate::types::{EventType, Handler, HandlerResult, OwnerId, WrappedId};
use arc_swap::ArcSwap;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A handler list swapped out of a repository.
///
/// It may hold the last reference to a removed handler, and dropping it runs
/// that handler's captured destructors. Callers holding the bus write lock
/// keep it until the lock is released, so those destructors can use the bus.
pub(crate) type Retired = Arc<dyn Any + Send + Sync>;

/// The entry a repository actually stores: the caller's handler plus the
/// liveness check fixed when it was subscribed.
pub(crate) struct WrappedHandler<T> {
    id: WrappedId,
    owner: OwnerId,
    check: LivenessCheck,
    handler: Handler<T>,
}

impl<T> WrappedHandler<T> {
    pub(crate) fn new(
        id: WrappedId,
        owner: OwnerId,
        check: LivenessCheck,
        handler: Handler<T>,
    ) -> Self {
        Self {
            id,
            owner,
            check,
            handler,
        }
    }

    pub(crate) fn id(&self) -> WrappedId {
        self.id
    }

    /// Run the handler unless the gate reports the owner dead.
    fn invoke(&self, event: &T, gate: &LivenessGate) -> HandlerResult {
        if !gate.admit(self.owner, &self.check) {
            return Ok(());
        }
        self.handler.call(event)
    }
}

/// Ordered handlers for one event type.
///
/// The handler list is an immutable `Vec` behind an [`ArcSwap`]. Writers build
/// a new list and swap it in; readers take one atomic load and iterate the
/// list they got, no matter what writers do meanwhile. Writers must hold the
/// bus write lock: `add` and `remove` are load-modify-store and are not safe
/// against each other.
pub(crate) struct HandlerRepository<T> {
    event_type: EventType,
    handlers: ArcSwap<Vec<Arc<WrappedHandler<T>>>>,
}

impl<T: 'static> HandlerRepository<T> {
    pub(crate) fn new() -> Self {
        Self {
            event_type: EventType::of::<T>(),
            handlers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Append a handler. Never blocks readers. Returns the replaced list.
    pub(crate) fn add(&self, handler: Arc<WrappedHandler<T>>) -> Retired {
        let current = self.handlers.load();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(handler);
        self.handlers.swap(Arc::new(next))
    }

    /// Excise a handler, keeping the relative order of the rest, and return
    /// the replaced list. `None` (list untouched) if it is not present.
    pub(crate) fn remove(&self, id: WrappedId) -> Option<Retired> {
        let current = self.handlers.load();
        let position = current.iter().position(|h| h.id() == id)?;

        let mut next = Vec::with_capacity(current.len() - 1);
        next.extend(current[..position].iter().cloned());
        next.extend(current[position + 1..].iter().cloned());
        Some(self.handlers.swap(Arc::new(next)))
    }

    /// Deliver `event` to every handler in the current snapshot, in order, on
    /// the calling thread. A failing or panicking handler is logged and the
    /// loop moves on. Returns the snapshot size.
    pub(crate) fn publish(&self, event: &T, gate: &LivenessGate) -> usize {
        let snapshot = self.handlers.load();

        for wrapped in snapshot.iter() {
            match panic::catch_unwind(AssertUnwindSafe(|| wrapped.invoke(event, gate))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        event_type = self.event_type.name(),
                        owner = %wrapped.owner,
                        handler = %wrapped.handler.id(),
                        error = %e,
                        "event handler failed"
                    );
                }
                Err(payload) => {
                    tracing::error!(
                        event_type = self.event_type.name(),
                        owner = %wrapped.owner,
                        handler = %wrapped.handler.id(),
                        panic = panic_message(payload.as_ref()),
                        "event handler panicked"
                    );
                }
            }
        }

        snapshot.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.load().len()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
