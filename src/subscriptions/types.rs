//! Keys and entries of the subscription index.

use crate::types::{EventType, HandlerId, OwnerId, WrappedId};

/// One subscription: who, with which handler, to what.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SubscriptionKey {
    pub owner: OwnerId,
    pub handler: HandlerId,
    pub event_type: EventType,
}

impl SubscriptionKey {
    pub(crate) fn new(owner: OwnerId, handler: HandlerId, event_type: EventType) -> Self {
        Self {
            owner,
            handler,
            event_type,
        }
    }
}

/// Locates the wrapped handler stored for a subscription: the repository it
/// lives in and its identity there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WrappedRef {
    pub id: WrappedId,
    pub event_type: EventType,
}
