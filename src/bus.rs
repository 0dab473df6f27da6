//! The event bus facade tying repositories, index and liveness together.

use crate::error::{BusError, Result};
use crate::liveness::{LivenessGate, LivenessProbe, Owner, ProbeAffinity};
use crate::repository::{HandlerRepository, RepositoryMap, Retired, WrappedHandler};
use crate::subscriptions::{SubscriptionIndex, SubscriptionKey, WrappedRef};
use crate::types::{BusStats, EventType, Handler, OwnerId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Default number of dead owners swept per publish.
pub const DEFAULT_CLEANUP_BATCH_SIZE: usize = 50;

/// Bus configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Max dead owners fully unregistered at the start of one publish.
    /// Default: 50
    pub cleanup_batch_size: usize,

    /// Which threads may consult the liveness probe.
    /// Default: the thread that builds the bus.
    pub probe_affinity: ProbeAffinity,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            cleanup_batch_size: DEFAULT_CLEANUP_BATCH_SIZE,
            probe_affinity: ProbeAffinity::default(),
        }
    }
}

impl BusConfig {
    /// Parse and validate a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cleanup_batch_size == 0 {
            return Err(BusError::InvalidConfig(
                "cleanup_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Owner-scoped publish/subscribe bus.
///
/// Provides:
/// - Lock-free, allocation-free publishing over a per-type handler snapshot
/// - Subscribe / unsubscribe serialized behind one write lock
/// - Automatic removal of owners the [`LivenessProbe`] reports dead
///
/// Handlers run synchronously on the publishing thread. The bus does no
/// thread marshalling; a handler that never returns stalls only the publish
/// that called it.
pub struct EventBus {
    config: BusConfig,

    /// The write lock. Held for every index change and every repository
    /// swap; never held while handlers run or while replaced handler lists
    /// are dropped.
    index: Mutex<SubscriptionIndex>,

    /// Per-type handler repositories.
    repositories: RepositoryMap,

    /// Liveness checks and the dead-owner queue.
    gate: LivenessGate,
}

impl EventBus {
    /// Create a bus with the default config. The calling thread becomes the
    /// primary thread for liveness checks.
    pub fn new(probe: Arc<dyn LivenessProbe>) -> Self {
        Self::build(probe, BusConfig::default(), Some(thread::current().id()))
    }

    /// Create a bus with a custom config.
    pub fn with_config(probe: Arc<dyn LivenessProbe>, config: BusConfig) -> Result<Self> {
        config.validate()?;
        let primary = match config.probe_affinity {
            ProbeAffinity::ConstructingThread => Some(thread::current().id()),
            ProbeAffinity::AnyThread => None,
        };
        Ok(Self::build(probe, config, primary))
    }

    /// Create a bus whose liveness checks are pinned to `primary`, whatever
    /// thread builds it.
    ///
    /// Checks are confined to a single thread, so the stored config reports
    /// [`ProbeAffinity::ConstructingThread`] regardless of what was passed in.
    pub fn with_primary_thread(
        probe: Arc<dyn LivenessProbe>,
        mut config: BusConfig,
        primary: ThreadId,
    ) -> Result<Self> {
        config.validate()?;
        config.probe_affinity = ProbeAffinity::ConstructingThread;
        Ok(Self::build(probe, config, Some(primary)))
    }

    fn build(probe: Arc<dyn LivenessProbe>, config: BusConfig, primary: Option<ThreadId>) -> Self {
        Self {
            config,
            index: Mutex::new(SubscriptionIndex::new()),
            repositories: RepositoryMap::new(),
            gate: LivenessGate::new(probe, primary),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    // --- Subscriptions ---

    /// Subscribe `handler` to events of type `T` on behalf of `owner`.
    ///
    /// Fails with [`BusError::UnsupportedOwnerKind`] for opaque owners,
    /// [`BusError::OwnerDead`] if the probe already reports the owner dead,
    /// [`BusError::LivenessCheckFailed`] if the liveness check panics, and
    /// [`BusError::DuplicateSubscription`] if this owner already subscribed
    /// this handler to `T`. Failures change nothing.
    pub fn subscribe<T: 'static>(&self, owner: &Owner, handler: &Handler<T>) -> Result<()> {
        let event_type = EventType::of::<T>();

        let Some(check) = owner.kind().liveness_check() else {
            tracing::error!(
                owner = %owner.id(),
                event_type = event_type.name(),
                "owner has no registrable capability; subscription refused"
            );
            return Err(BusError::UnsupportedOwnerKind {
                owner: owner.id(),
                event_type,
            });
        };

        let admitted =
            panic::catch_unwind(AssertUnwindSafe(|| self.gate.admit(owner.id(), &check)));
        let Ok(alive) = admitted else {
            tracing::error!(
                owner = %owner.id(),
                event_type = event_type.name(),
                "liveness check panicked; subscription refused"
            );
            return Err(BusError::LivenessCheckFailed {
                owner: owner.id(),
                event_type,
            });
        };

        if !alive {
            tracing::warn!(
                owner = %owner.id(),
                event_type = event_type.name(),
                "owner is already dead; subscription refused"
            );
            return Err(BusError::OwnerDead {
                owner: owner.id(),
                event_type,
            });
        }

        let key = SubscriptionKey::new(owner.id(), handler.id(), event_type);

        let retired = {
            let mut index = self.index.lock();
            let id = index.allocate_id();
            index.register(key, WrappedRef { id, event_type })?;

            let repository = self.repositories.get_or_create::<T>();
            repository.add(Arc::new(WrappedHandler::new(
                id,
                owner.id(),
                check,
                handler.clone(),
            )))
        };
        drop(retired);

        tracing::debug!(
            owner = %owner.id(),
            handler = %handler.id(),
            event_type = event_type.name(),
            "subscribed"
        );
        Ok(())
    }

    /// Remove one subscription.
    ///
    /// An unknown subscription is reported as [`BusError::SubscriptionNotFound`]
    /// and otherwise ignored.
    pub fn unsubscribe<T: 'static>(
        &self,
        owner: impl Into<OwnerId>,
        handler: &Handler<T>,
    ) -> Result<()> {
        let owner = owner.into();
        let event_type = EventType::of::<T>();
        let key = SubscriptionKey::new(owner, handler.id(), event_type);

        let retired = {
            let mut index = self.index.lock();
            let Some(wrapped) = index.unregister_one(key) else {
                return Err(BusError::SubscriptionNotFound { owner, event_type });
            };
            self.repositories.remove(wrapped.event_type, wrapped.id)
        };
        drop(retired);

        tracing::debug!(
            owner = %owner,
            handler = %handler.id(),
            event_type = event_type.name(),
            "unsubscribed"
        );
        Ok(())
    }

    /// Remove every handler `owner` has subscribed to `T`.
    pub fn unsubscribe_all<T: 'static>(&self, owner: impl Into<OwnerId>) {
        let owner = owner.into();
        let event_type = EventType::of::<T>();

        let mut retired = Vec::new();
        let removed = {
            let mut index = self.index.lock();
            let removed = index.unregister_all(owner, event_type);
            self.remove_wrapped(&removed, &mut retired);
            removed
        };
        drop(retired);

        tracing::debug!(
            owner = %owner,
            event_type = event_type.name(),
            removed = removed.len(),
            "unsubscribed all handlers"
        );
    }

    /// Remove every subscription `owner` has, for every event type. Returns
    /// how many were removed.
    pub fn unsubscribe_owner(&self, owner: impl Into<OwnerId>) -> usize {
        let owner = owner.into();

        let mut retired = Vec::new();
        let removed = {
            let mut index = self.index.lock();
            let removed = index.unregister_owner(owner);
            self.remove_wrapped(&removed, &mut retired);
            removed
        };
        drop(retired);

        tracing::debug!(owner = %owner, removed = removed.len(), "unsubscribed owner");
        removed.len()
    }

    // --- Publishing ---

    /// Deliver `event` to every handler subscribed to `T`, in subscription
    /// order, on the calling thread.
    ///
    /// If dead owners are queued, up to `cleanup_batch_size` of them are swept
    /// first under the write lock; handlers removed by the sweep are released
    /// after the lock is. After that the call takes no lock: it
    /// delivers to the handler snapshot current at that moment. Handler errors
    /// and panics are logged and never reach the caller.
    pub fn publish<T: 'static>(&self, event: T) {
        if !self.gate.dead_owners().is_empty() {
            let mut retired = Vec::new();
            {
                let mut index = self.index.lock();
                self.sweep_dead_owners(&mut index, self.config.cleanup_batch_size, &mut retired);
            }
            drop(retired);
        }

        let repository = self.repository::<T>();
        let delivered = repository.publish(&event, &self.gate);
        if delivered == 0 {
            tracing::trace!(event_type = EventType::of::<T>().name(), "published to no handlers");
        }
    }

    /// Sweep the whole dead-owner queue now. Returns the number of owners
    /// whose subscriptions were removed.
    pub fn drain_dead_owners(&self) -> usize {
        let mut retired = Vec::new();
        let swept = {
            let mut index = self.index.lock();
            self.sweep_dead_owners(&mut index, usize::MAX, &mut retired)
        };
        drop(retired);
        swept
    }

    // --- Introspection ---

    /// Handlers in the current snapshot for `T`.
    pub fn subscriber_count<T: 'static>(&self) -> usize {
        self.repositories.subscriber_count(EventType::of::<T>())
    }

    pub fn is_subscribed<T: 'static>(
        &self,
        owner: impl Into<OwnerId>,
        handler: &Handler<T>,
    ) -> bool {
        let key = SubscriptionKey::new(owner.into(), handler.id(), EventType::of::<T>());
        self.index.lock().contains(&key)
    }

    /// Dead-owner queue entries awaiting a drain. An owner can appear more
    /// than once.
    pub fn pending_dead_owners(&self) -> usize {
        self.gate.dead_owners().len()
    }

    pub fn stats(&self) -> BusStats {
        let index = self.index.lock();
        BusStats {
            event_types: self.repositories.event_types(),
            owners: index.owners(),
            subscriptions: index.len(),
            pending_dead_owners: self.gate.dead_owners().len(),
        }
    }

    // --- Internals ---

    /// The repository for `T`. Takes the write lock only the first time `T`
    /// is seen.
    fn repository<T: 'static>(&self) -> Arc<HandlerRepository<T>> {
        if let Some(repository) = self.repositories.get::<T>() {
            return repository;
        }
        let _index = self.index.lock();
        self.repositories.get_or_create::<T>()
    }

    /// Remove wrapped handlers from their repositories, collecting the
    /// replaced lists. The caller drops `retired` once the write lock is gone.
    fn remove_wrapped(&self, removed: &[WrappedRef], retired: &mut Vec<Retired>) {
        for wrapped in removed {
            retired.extend(self.repositories.remove(wrapped.event_type, wrapped.id));
        }
    }

    /// Unregister up to `limit` dead owners. Queue entries for owners with
    /// nothing left to remove (already swept, or queued twice) do not count
    /// toward the limit.
    ///
    /// The limit bounds swept owners, not dequeues: one call may pop any
    /// number of stale entries under the lock. Each such pop is an O(1)
    /// channel receive plus an index miss.
    fn sweep_dead_owners(
        &self,
        index: &mut SubscriptionIndex,
        limit: usize,
        retired: &mut Vec<Retired>,
    ) -> usize {
        let mut swept = 0;
        while swept < limit {
            let Some(owner) = self.gate.dead_owners().pop() else {
                break;
            };

            let removed = index.unregister_owner(owner);
            if removed.is_empty() {
                continue;
            }
            self.remove_wrapped(&removed, retired);
            swept += 1;

            tracing::info!(
                owner = %owner,
                subscriptions = removed.len(),
                "swept dead owner"
            );
        }

        if swept > 0 {
            tracing::debug!(
                swept,
                remaining = self.gate.dead_owners().len(),
                "dead-owner drain finished"
            );
        }
        swept
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}
