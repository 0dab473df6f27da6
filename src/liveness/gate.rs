//! Primary-thread gate around the liveness probe.

use super::probe::{LivenessCheck, LivenessProbe};
use super::queue::DeadOwnerQueue;
use crate::types::OwnerId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Which threads may consult the liveness probe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeAffinity {
    /// Only the thread that built the bus. Publishes on other threads skip the
    /// check and treat the owner as alive.
    #[default]
    ConstructingThread,
    /// The probe is thread-safe; every publishing thread consults it.
    AnyThread,
}

/// Runs the per-invocation liveness check and records dead owners.
pub(crate) struct LivenessGate {
    probe: Arc<dyn LivenessProbe>,
    /// `None` when any thread may probe.
    primary: Option<ThreadId>,
    dead: DeadOwnerQueue,
}

impl LivenessGate {
    pub(crate) fn new(probe: Arc<dyn LivenessProbe>, primary: Option<ThreadId>) -> Self {
        Self {
            probe,
            primary,
            dead: DeadOwnerQueue::new(),
        }
    }

    pub(crate) fn dead_owners(&self) -> &DeadOwnerQueue {
        &self.dead
    }

    /// Whether the handler registered under `owner` should run.
    ///
    /// An owner found dead is queued for the next drain.
    pub(crate) fn admit(&self, owner: OwnerId, check: &LivenessCheck) -> bool {
        if matches!(check, LivenessCheck::Unchecked) {
            return true;
        }

        if let Some(primary) = self.primary {
            if thread::current().id() != primary {
                tracing::warn!(
                    owner = %owner,
                    "liveness check skipped off the primary thread; assuming alive"
                );
                return true;
            }
        }

        let dead = match check {
            LivenessCheck::Unchecked => false,
            LivenessCheck::Owner => self.probe.is_dead(owner),
            LivenessCheck::Parent(binding) => match binding.resolve_parent(owner) {
                Some(parent) => self.probe.is_dead(parent),
                None => true,
            },
        };

        if dead {
            tracing::debug!(owner = %owner, "owner reported dead; queued for cleanup");
            self.dead.push(owner);
        }
        !dead
    }
}
