//! Core types for the event bus.

use serde::{Deserialize, Serialize};
use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter backing [`OwnerId::new`]. Starts at 1 so `OwnerId(0)` is never handed out.
static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a subscribing entity.
///
/// Only equality matters to the bus; it never looks behind the id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub u64);

impl OwnerId {
    /// Allocate a fresh id. Ids from this constructor are never reused
    /// within the process.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        OwnerId(NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap a key supplied by the host object model.
    pub fn from_raw(raw: u64) -> Self {
        OwnerId(raw)
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerId({})", self.0)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of an event type. Equality and hashing use the `TypeId` only;
/// the name is carried for logs and errors.
#[derive(Clone, Copy)]
pub struct EventType {
    id: TypeId,
    name: &'static str,
}

impl EventType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for EventType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EventType {}

impl Hash for EventType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventType({})", self.name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// What a handler returns. `Err` is logged by the bus and never reaches the publisher.
pub type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Identity of a [`Handler`]: the address of its shared callback allocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(usize);

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerId({:#x})", self.0)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

type Callback<T> = dyn Fn(&T) -> HandlerResult + Send + Sync;

/// A caller-supplied callback for events of type `T`.
///
/// Cloning is cheap and keeps the identity: every clone is the same handler
/// for duplicate detection and for [`unsubscribe`](crate::EventBus::unsubscribe).
/// Two separately constructed handlers are always distinct, even when they
/// wrap identical closures.
pub struct Handler<T> {
    callback: Arc<Callback<T>>,
}

impl<T: 'static> Handler<T> {
    /// Wrap an infallible callback.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(move |event: &T| -> HandlerResult {
                f(event);
                Ok(())
            }),
        }
    }

    /// Wrap a callback that can fail. Failures are logged and skipped.
    pub fn fallible<F, E>(f: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        Self {
            callback: Arc::new(move |event: &T| -> HandlerResult {
                f(event).map_err(Into::into)
            }),
        }
    }
}

impl<T> Handler<T> {
    pub fn id(&self) -> HandlerId {
        HandlerId(Arc::as_ptr(&self.callback) as *const () as usize)
    }

    pub(crate) fn call(&self, event: &T) -> HandlerResult {
        (self.callback)(event)
    }
}

impl<T> Clone for Handler<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Arc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for Handler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.id()).finish()
    }
}

/// Identity of a wrapped dispatch entry inside a repository.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct WrappedId(pub(crate) u64);

/// Point-in-time counters for a bus.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    /// Event types with a repository.
    pub event_types: usize,
    /// Owners with at least one active subscription.
    pub owners: usize,
    /// Active (owner, handler, event type) subscriptions.
    pub subscriptions: usize,
    /// Dead owners waiting for the next drain.
    pub pending_dead_owners: usize,
}
