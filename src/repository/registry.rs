//! Lazily populated map from event type to its handler repository.

use super::handlers::{HandlerRepository, Retired};
use crate::types::{EventType, WrappedId};
use arc_swap::ArcSwap;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Type-erased view of a [`HandlerRepository`], enough to sweep a dead owner
/// across event types without knowing `T`.
pub(crate) trait ErasedRepository: Send + Sync {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
    fn remove(&self, id: WrappedId) -> Option<Retired>;
    fn len(&self) -> usize;
}

impl<T: 'static> ErasedRepository for HandlerRepository<T> {
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }

    fn remove(&self, id: WrappedId) -> Option<Retired> {
        HandlerRepository::remove(self, id)
    }

    fn len(&self) -> usize {
        HandlerRepository::len(self)
    }
}

type Repositories = HashMap<EventType, Arc<dyn ErasedRepository>>;

/// One repository per event type, created on first use and kept for the
/// life of the bus.
///
/// Lookups are a single atomic load. Inserting a new type copies the map;
/// that happens once per type, under the bus write lock.
pub(crate) struct RepositoryMap {
    repositories: ArcSwap<Repositories>,
}

impl RepositoryMap {
    pub(crate) fn new() -> Self {
        Self {
            repositories: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub(crate) fn get<T: 'static>(&self) -> Option<Arc<HandlerRepository<T>>> {
        let erased = self.repositories.load().get(&EventType::of::<T>()).cloned()?;
        erased.into_any().downcast::<HandlerRepository<T>>().ok()
    }

    /// Fetch the repository for `T`, creating it if needed.
    /// Caller must hold the bus write lock.
    pub(crate) fn get_or_create<T: 'static>(&self) -> Arc<HandlerRepository<T>> {
        if let Some(existing) = self.get::<T>() {
            return existing;
        }

        let event_type = EventType::of::<T>();
        let created = Arc::new(HandlerRepository::<T>::new());
        let mut next = Repositories::clone(&self.repositories.load());
        next.insert(event_type, Arc::clone(&created) as Arc<dyn ErasedRepository>);
        self.repositories.store(Arc::new(next));

        tracing::debug!(event_type = event_type.name(), "created handler repository");
        created
    }

    /// Remove a wrapped handler from whichever repository holds `event_type`,
    /// returning the replaced handler list.
    /// Caller must hold the bus write lock.
    pub(crate) fn remove(&self, event_type: EventType, id: WrappedId) -> Option<Retired> {
        self.repositories.load().get(&event_type)?.remove(id)
    }

    pub(crate) fn subscriber_count(&self, event_type: EventType) -> usize {
        self.repositories
            .load()
            .get(&event_type)
            .map_or(0, |repository| repository.len())
    }

    pub(crate) fn event_types(&self) -> usize {
        self.repositories.load().len()
    }
}
