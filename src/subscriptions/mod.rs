//! Subscription bookkeeping.
//!
//! The [`SubscriptionIndex`] answers three questions in O(1) amortized time:
//! - which wrapped handler belongs to an (owner, handler, event type) triple
//!   (duplicate detection and single unsubscribe)
//! - which handlers an owner has for one event type (unsubscribe-all)
//! - everything an owner is subscribed to (dead-owner sweep)
//!
//! The index only tracks identities; the handlers themselves live in the
//! per-type repositories.

mod index;
mod types;

pub(crate) use index::SubscriptionIndex;
pub(crate) use types::{SubscriptionKey, WrappedRef};
