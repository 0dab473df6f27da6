//! Error types for the event bus.

use crate::types::{EventType, OwnerId};
use thiserror::Error;

/// Main error type for bus operations.
///
/// None of these are fatal: each one is logged where it is detected and
/// leaves the bus state unchanged.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Owner {owner} has no registrable capability (event type {event_type})")]
    UnsupportedOwnerKind { owner: OwnerId, event_type: EventType },

    #[error("Owner {owner} is already dead (event type {event_type})")]
    OwnerDead { owner: OwnerId, event_type: EventType },

    #[error("Liveness check for owner {owner} panicked (event type {event_type})")]
    LivenessCheckFailed { owner: OwnerId, event_type: EventType },

    #[error("Owner {owner} is already subscribed with this handler to {event_type}")]
    DuplicateSubscription { owner: OwnerId, event_type: EventType },

    #[error("Owner {owner} has no subscription with this handler to {event_type}")]
    SubscriptionNotFound { owner: OwnerId, event_type: EventType },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration decode error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for BusError {
    fn from(e: serde_json::Error) -> Self {
        BusError::Config(e.to_string())
    }
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
