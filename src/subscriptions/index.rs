//! Bookkeeping for who is subscribed to what.

use super::types::{SubscriptionKey, WrappedRef};
use crate::error::{BusError, Result};
use crate::types::{EventType, HandlerId, OwnerId, WrappedId};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Three views of the active subscriptions, kept in agreement.
///
/// The index is not synchronized itself; the bus keeps it behind its write
/// lock so every method sees and leaves all three maps consistent.
#[derive(Default)]
pub(crate) struct SubscriptionIndex {
    /// owner -> every (handler, event type) it is subscribed with.
    by_owner: HashMap<OwnerId, HashSet<(HandlerId, EventType)>>,
    /// (owner, event type) -> handlers.
    by_owner_type: HashMap<(OwnerId, EventType), HashSet<HandlerId>>,
    /// subscription -> the wrapped handler stored in the repository.
    wrapped: HashMap<SubscriptionKey, WrappedRef>,
    /// Counter for wrapped handler ids.
    next_wrapped: u64,
}

impl SubscriptionIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Reserve an id for a wrapped handler about to be registered.
    pub(crate) fn allocate_id(&mut self) -> WrappedId {
        self.next_wrapped += 1;
        WrappedId(self.next_wrapped)
    }

    /// Record a subscription. Fails without touching anything if the
    /// (owner, handler, event type) triple is already present.
    pub(crate) fn register(&mut self, key: SubscriptionKey, wrapped: WrappedRef) -> Result<()> {
        match self.wrapped.entry(key) {
            Entry::Occupied(_) => {
                tracing::warn!(
                    owner = %key.owner,
                    handler = %key.handler,
                    event_type = key.event_type.name(),
                    "duplicate subscription refused"
                );
                return Err(BusError::DuplicateSubscription {
                    owner: key.owner,
                    event_type: key.event_type,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(wrapped);
            }
        }

        self.by_owner
            .entry(key.owner)
            .or_default()
            .insert((key.handler, key.event_type));
        self.by_owner_type
            .entry((key.owner, key.event_type))
            .or_default()
            .insert(key.handler);
        Ok(())
    }

    /// Drop one subscription and hand back its wrapped handler.
    pub(crate) fn unregister_one(&mut self, key: SubscriptionKey) -> Option<WrappedRef> {
        let Some(wrapped) = self.wrapped.remove(&key) else {
            tracing::warn!(
                owner = %key.owner,
                handler = %key.handler,
                event_type = key.event_type.name(),
                "subscription not found"
            );
            return None;
        };

        self.forget_owner_entry(key.owner, key.handler, key.event_type);
        let slot = self.by_owner_type.entry((key.owner, key.event_type));
        if let Entry::Occupied(mut handlers) = slot {
            handlers.get_mut().remove(&key.handler);
            if handlers.get().is_empty() {
                handlers.remove();
            }
        }
        Some(wrapped)
    }

    /// Drop every subscription `owner` has for `event_type`.
    pub(crate) fn unregister_all(
        &mut self,
        owner: OwnerId,
        event_type: EventType,
    ) -> Vec<WrappedRef> {
        let Some(handlers) = self.by_owner_type.remove(&(owner, event_type)) else {
            return Vec::new();
        };

        let mut removed = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let key = SubscriptionKey::new(owner, handler, event_type);
            if let Some(wrapped) = self.wrapped.remove(&key) {
                removed.push(wrapped);
            }
            self.forget_owner_entry(owner, handler, event_type);
        }
        removed
    }

    /// Drop every subscription `owner` has, across all event types.
    pub(crate) fn unregister_owner(&mut self, owner: OwnerId) -> Vec<WrappedRef> {
        let Some(entries) = self.by_owner.remove(&owner) else {
            return Vec::new();
        };

        let mut removed = Vec::with_capacity(entries.len());
        for (handler, event_type) in entries {
            let key = SubscriptionKey::new(owner, handler, event_type);
            if let Some(wrapped) = self.wrapped.remove(&key) {
                removed.push(wrapped);
            }
            self.by_owner_type.remove(&(owner, event_type));
        }
        removed
    }

    pub(crate) fn contains(&self, key: &SubscriptionKey) -> bool {
        self.wrapped.contains_key(key)
    }

    /// Number of active subscriptions.
    pub(crate) fn len(&self) -> usize {
        self.wrapped.len()
    }

    /// Number of owners with at least one subscription.
    pub(crate) fn owners(&self) -> usize {
        self.by_owner.len()
    }

    /// Remove one (handler, event type) pair from the per-owner view, dropping
    /// the owner entry once it is empty.
    fn forget_owner_entry(&mut self, owner: OwnerId, handler: HandlerId, event_type: EventType) {
        if let Entry::Occupied(mut entries) = self.by_owner.entry(owner) {
            entries.get_mut().remove(&(handler, event_type));
            if entries.get().is_empty() {
                entries.remove();
            }
        }
    }

    /// Assert the three views describe the same set of subscriptions.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut from_owner = 0;
        for (owner, entries) in &self.by_owner {
            assert!(!entries.is_empty(), "empty owner entry for {owner}");
            for &(handler, event_type) in entries {
                let key = SubscriptionKey::new(*owner, handler, event_type);
                assert!(self.wrapped.contains_key(&key), "{key:?} missing from wrapped map");
                assert!(self
                    .by_owner_type
                    .get(&(*owner, event_type))
                    .is_some_and(|handlers| handlers.contains(&handler)));
                from_owner += 1;
            }
        }

        let from_owner_type: usize = self.by_owner_type.values().map(HashSet::len).sum();
        assert!(self.by_owner_type.values().all(|handlers| !handlers.is_empty()));
        assert_eq!(from_owner, self.wrapped.len());
        assert_eq!(from_owner_type, self.wrapped.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Handler;
    use proptest::prelude::*;

    struct Click;
    struct Scroll;

    /// Handlers stay alive for the whole test so their ids cannot be reused.
    fn handlers(n: usize) -> Vec<Handler<Click>> {
        (0..n).map(|_| Handler::new(|_: &Click| {})).collect()
    }

    fn register(index: &mut SubscriptionIndex, key: SubscriptionKey) -> Result<WrappedId> {
        let id = index.allocate_id();
        index.register(
            key,
            WrappedRef {
                id,
                event_type: key.event_type,
            },
        )?;
        Ok(id)
    }

    #[test]
    fn test_register_and_unregister_one() {
        let hs = handlers(1);
        let mut index = SubscriptionIndex::new();
        let key = SubscriptionKey::new(OwnerId(1), hs[0].id(), EventType::of::<Click>());

        let id = register(&mut index, key).unwrap();
        assert!(index.contains(&key));
        assert_eq!(index.len(), 1);
        assert_eq!(index.owners(), 1);
        index.assert_consistent();

        let removed = index.unregister_one(key).unwrap();
        assert_eq!(removed.id, id);
        assert_eq!(index.len(), 0);
        assert_eq!(index.owners(), 0);
        index.assert_consistent();
    }

    #[test]
    fn test_duplicate_refused_without_change() {
        let hs = handlers(1);
        let mut index = SubscriptionIndex::new();
        let key = SubscriptionKey::new(OwnerId(1), hs[0].id(), EventType::of::<Click>());

        let first = register(&mut index, key).unwrap();
        let second = register(&mut index, key);
        assert!(matches!(second, Err(BusError::DuplicateSubscription { .. })));

        assert_eq!(index.len(), 1);
        assert_eq!(index.unregister_one(key).unwrap().id, first);
    }

    #[test]
    fn test_unregister_missing_is_none() {
        let hs = handlers(1);
        let mut index = SubscriptionIndex::new();
        let key = SubscriptionKey::new(OwnerId(1), hs[0].id(), EventType::of::<Click>());
        assert!(index.unregister_one(key).is_none());
        index.assert_consistent();
    }

    #[test]
    fn test_unregister_all_for_one_type() {
        let hs = handlers(2);
        let mut index = SubscriptionIndex::new();
        let owner = OwnerId(1);
        let (h1, h2) = (hs[0].id(), hs[1].id());

        register(&mut index, SubscriptionKey::new(owner, h1, EventType::of::<Click>())).unwrap();
        register(&mut index, SubscriptionKey::new(owner, h2, EventType::of::<Click>())).unwrap();
        register(&mut index, SubscriptionKey::new(owner, h1, EventType::of::<Scroll>())).unwrap();

        let removed = index.unregister_all(owner, EventType::of::<Click>());
        assert_eq!(removed.len(), 2);
        assert!(removed.iter().all(|w| w.event_type == EventType::of::<Click>()));
        assert_eq!(index.len(), 1);
        assert_eq!(index.owners(), 1);
        index.assert_consistent();

        assert!(index.unregister_all(owner, EventType::of::<Click>()).is_empty());
    }

    #[test]
    fn test_unregister_owner_sweeps_all_types() {
        let hs = handlers(1);
        let mut index = SubscriptionIndex::new();
        let (alive, dead) = (OwnerId(1), OwnerId(2));
        let h = hs[0].id();

        register(&mut index, SubscriptionKey::new(dead, h, EventType::of::<Click>())).unwrap();
        register(&mut index, SubscriptionKey::new(dead, h, EventType::of::<Scroll>())).unwrap();
        register(&mut index, SubscriptionKey::new(alive, h, EventType::of::<Click>())).unwrap();

        assert_eq!(index.unregister_owner(dead).len(), 2);
        assert_eq!(index.owners(), 1);
        assert_eq!(index.len(), 1);
        index.assert_consistent();

        // Sweeping again finds nothing.
        assert!(index.unregister_owner(dead).is_empty());
    }

    #[derive(Clone, Debug)]
    enum Op {
        Register { owner: u64, handler: usize, scroll: bool },
        UnregisterOne { owner: u64, handler: usize, scroll: bool },
        UnregisterAll { owner: u64, scroll: bool },
        UnregisterOwner { owner: u64 },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => (0..4u64, 0..3usize, any::<bool>())
                .prop_map(|(owner, handler, scroll)| Op::Register { owner, handler, scroll }),
            2 => (0..4u64, 0..3usize, any::<bool>())
                .prop_map(|(owner, handler, scroll)| Op::UnregisterOne { owner, handler, scroll }),
            1 => (0..4u64, any::<bool>()).prop_map(|(owner, scroll)| Op::UnregisterAll { owner, scroll }),
            1 => (0..4u64).prop_map(|owner| Op::UnregisterOwner { owner }),
        ]
    }

    proptest! {
        #[test]
        fn test_views_stay_consistent(ops in prop::collection::vec(op(), 0..64)) {
            let hs = handlers(3);
            let handlers: Vec<HandlerId> = hs.iter().map(Handler::id).collect();
            let event_type = |scroll: bool| {
                if scroll { EventType::of::<Scroll>() } else { EventType::of::<Click>() }
            };
            let mut index = SubscriptionIndex::new();
            let mut model: HashSet<SubscriptionKey> = HashSet::new();

            for op in ops {
                match op {
                    Op::Register { owner, handler, scroll } => {
                        let key = SubscriptionKey::new(OwnerId(owner), handlers[handler], event_type(scroll));
                        let fresh = model.insert(key);
                        prop_assert_eq!(register(&mut index, key).is_ok(), fresh);
                    }
                    Op::UnregisterOne { owner, handler, scroll } => {
                        let key = SubscriptionKey::new(OwnerId(owner), handlers[handler], event_type(scroll));
                        prop_assert_eq!(index.unregister_one(key).is_some(), model.remove(&key));
                    }
                    Op::UnregisterAll { owner, scroll } => {
                        let et = event_type(scroll);
                        let before = model.len();
                        model.retain(|k| !(k.owner == OwnerId(owner) && k.event_type == et));
                        prop_assert_eq!(index.unregister_all(OwnerId(owner), et).len(), before - model.len());
                    }
                    Op::UnregisterOwner { owner } => {
                        let before = model.len();
                        model.retain(|k| k.owner != OwnerId(owner));
                        prop_assert_eq!(index.unregister_owner(OwnerId(owner)).len(), before - model.len());
                    }
                }
                index.assert_consistent();
                prop_assert_eq!(index.len(), model.len());
            }
        }
    }
}
