//! Owner capabilities and the liveness collaborators the bus consults.

use crate::types::OwnerId;
use std::fmt;
use std::sync::Arc;

/// Decides whether an owner has been destroyed.
///
/// Implemented by the host object model. Unless the bus is configured with
/// [`ProbeAffinity::AnyThread`](super::ProbeAffinity::AnyThread), the probe
/// is only ever called from the bus's primary thread.
pub trait LivenessProbe: Send + Sync {
    fn is_dead(&self, candidate: OwnerId) -> bool;
}

impl<F> LivenessProbe for F
where
    F: Fn(OwnerId) -> bool + Send + Sync,
{
    fn is_dead(&self, candidate: OwnerId) -> bool {
        self(candidate)
    }
}

/// Probe for buses whose owners are all unmanaged, or whose host has no
/// liveness signal at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysAlive;

impl LivenessProbe for AlwaysAlive {
    fn is_dead(&self, _candidate: OwnerId) -> bool {
        false
    }
}

/// Delegates a child owner's liveness to a parent object.
pub trait ChildBinding: Send + Sync {
    /// The id to probe in place of `owner`. `None` means the parent is gone.
    fn resolve_parent(&self, owner: OwnerId) -> Option<OwnerId>;
}

impl<F> ChildBinding for F
where
    F: Fn(OwnerId) -> Option<OwnerId> + Send + Sync,
{
    fn resolve_parent(&self, owner: OwnerId) -> Option<OwnerId> {
        self(owner)
    }
}

/// Capability class of an owner, as reported by the host object model.
#[derive(Clone)]
pub enum OwnerKind {
    /// Liveness is probed with the owner's own id; dead owners are cleaned up
    /// automatically.
    Probed,
    /// No liveness signal. Subscriptions live until explicitly removed.
    Unmanaged,
    /// Liveness follows the parent resolved by the binding.
    ChildBound(Arc<dyn ChildBinding>),
    /// The host cannot classify this owner. Refused by `subscribe`.
    Opaque,
}

impl OwnerKind {
    /// Resolve the check a wrapped handler runs before each call.
    /// `None` for owners that cannot be registered.
    pub(crate) fn liveness_check(&self) -> Option<LivenessCheck> {
        match self {
            OwnerKind::Probed => Some(LivenessCheck::Owner),
            OwnerKind::Unmanaged => Some(LivenessCheck::Unchecked),
            OwnerKind::ChildBound(binding) => Some(LivenessCheck::Parent(Arc::clone(binding))),
            OwnerKind::Opaque => None,
        }
    }
}

impl fmt::Debug for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKind::Probed => f.write_str("Probed"),
            OwnerKind::Unmanaged => f.write_str("Unmanaged"),
            OwnerKind::ChildBound(_) => f.write_str("ChildBound"),
            OwnerKind::Opaque => f.write_str("Opaque"),
        }
    }
}

/// A subscribing entity: its identity plus its capability class.
#[derive(Clone, Debug)]
pub struct Owner {
    id: OwnerId,
    kind: OwnerKind,
}

impl Owner {
    pub fn new(id: OwnerId, kind: OwnerKind) -> Self {
        Self { id, kind }
    }

    pub fn probed(id: OwnerId) -> Self {
        Self::new(id, OwnerKind::Probed)
    }

    pub fn unmanaged(id: OwnerId) -> Self {
        Self::new(id, OwnerKind::Unmanaged)
    }

    pub fn child_bound(id: OwnerId, binding: Arc<dyn ChildBinding>) -> Self {
        Self::new(id, OwnerKind::ChildBound(binding))
    }

    pub fn id(&self) -> OwnerId {
        self.id
    }

    pub fn kind(&self) -> &OwnerKind {
        &self.kind
    }
}

impl From<&Owner> for OwnerId {
    fn from(owner: &Owner) -> Self {
        owner.id
    }
}

/// Per-subscription liveness check, fixed at registration.
#[derive(Clone)]
pub(crate) enum LivenessCheck {
    Unchecked,
    Owner,
    Parent(Arc<dyn ChildBinding>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_probe() {
        let dead = OwnerId(3);
        let probe = move |id: OwnerId| id == dead;
        assert!(probe.is_dead(OwnerId(3)));
        assert!(!probe.is_dead(OwnerId(4)));
        assert!(!AlwaysAlive.is_dead(OwnerId(3)));
    }

    #[test]
    fn test_kind_resolution() {
        let parent = OwnerId(10);
        let binding: Arc<dyn ChildBinding> = Arc::new(move |_: OwnerId| Some(parent));

        assert!(matches!(OwnerKind::Probed.liveness_check(), Some(LivenessCheck::Owner)));
        assert!(matches!(OwnerKind::Unmanaged.liveness_check(), Some(LivenessCheck::Unchecked)));
        assert!(matches!(
            OwnerKind::ChildBound(binding).liveness_check(),
            Some(LivenessCheck::Parent(_))
        ));
        assert!(OwnerKind::Opaque.liveness_check().is_none());
    }
}
