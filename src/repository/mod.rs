//! Per-event-type handler storage.
//!
//! Each event type gets one [`HandlerRepository`] holding an immutable,
//! atomically swapped list of wrapped handlers. Publishing reads that list
//! with one atomic load and no lock; subscribing and unsubscribing replace it
//! under the bus write lock.

mod handlers;
mod registry;

pub(crate) use handlers::{HandlerRepository, Retired, WrappedHandler};
pub(crate) use registry::RepositoryMap;
