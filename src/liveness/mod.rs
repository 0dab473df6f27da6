//! Owner liveness: capability classes, the external probe, and the
//! dead-owner queue fed from the publish path.
//!
//! A wrapped handler asks the [`LivenessGate`] before every call. Probed
//! owners are checked by id, child-bound owners through their parent, and
//! unmanaged owners are never checked. An owner found dead is skipped and
//! queued; the bus sweeps the queue in bounded batches at the start of later
//! publishes.

mod gate;
mod probe;
mod queue;

pub(crate) use gate::LivenessGate;
pub use gate::ProbeAffinity;
pub(crate) use probe::LivenessCheck;
pub use probe::{AlwaysAlive, ChildBinding, LivenessProbe, Owner, OwnerKind};
