//! Queue of owners observed dead during a publish.

use crate::types::OwnerId;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Unbounded multi-producer queue of dead owners.
///
/// Pushes happen on the publish path and never block. Pops happen only while
/// the bus write lock is held. The same owner may be queued more than once;
/// sweeping an already-swept owner is a no-op.
pub(crate) struct DeadOwnerQueue {
    sender: Sender<OwnerId>,
    receiver: Receiver<OwnerId>,
}

impl DeadOwnerQueue {
    pub(crate) fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub(crate) fn push(&self, owner: OwnerId) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.sender.send(owner);
    }

    pub(crate) fn pop(&self) -> Option<OwnerId> {
        self.receiver.try_recv().ok()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.len()
    }
}
