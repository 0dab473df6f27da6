//! # Owner Bus
//!
//! An in-process publish/subscribe event bus where every subscription belongs
//! to an owner that may be destroyed without telling the bus.
//!
//! ## Core Concepts
//!
//! - **Repositories**: one per event type, holding an immutable handler list
//!   that publishers read with a single atomic load
//! - **Owners**: identity keys with a capability class (probed, unmanaged,
//!   child-bound) that decides how their liveness is checked
//! - **Index**: owner / event type / handler bookkeeping for O(1) unsubscribe
//!   and duplicate detection
//! - **Dead-owner drain**: owners found dead while publishing are queued and
//!   swept in bounded batches by later publishes
//!
//! ## Example
//!
//! ```ignore
//! use owner_bus::{EventBus, Handler, Owner, OwnerId};
//! use std::sync::Arc;
//!
//! struct Tick { n: u32 }
//!
//! let bus = EventBus::new(Arc::new(|id: OwnerId| host.is_destroyed(id)));
//!
//! let owner = Owner::probed(widget.owner_id());
//! let on_tick = Handler::new(|tick: &Tick| println!("tick {}", tick.n));
//! bus.subscribe(&owner, &on_tick)?;
//!
//! bus.publish(Tick { n: 1 });
//!
//! bus.unsubscribe(&owner, &on_tick)?;
//! ```

pub mod bus;
pub mod error;
pub mod liveness;
mod repository;
mod subscriptions;
pub mod types;

// Re-exports
pub use bus::{BusConfig, EventBus, DEFAULT_CLEANUP_BATCH_SIZE};
pub use error::{BusError, Result};
pub use liveness::{AlwaysAlive, ChildBinding, LivenessProbe, Owner, OwnerKind, ProbeAffinity};
pub use types::*;
