//! Error types for the Agora runtime.

use thiserror::Error;

use crate::entity::Entity;
use crate::world::SubscriptionId;

/// Top-level error type for entity store, group and pipeline operations.
///
/// Every variant here is *structural*: it means the shared index was used
/// incorrectly. Per-entity decision failures never surface as an `EcsError`.
#[derive(Error, Debug)]
pub enum EcsError {
    /// An entity with this display name already exists.
    #[error("Duplicate entity name: {0}")]
    DuplicateName(String),

    /// The entity handle does not refer to a live entity.
    #[error("Entity not found: {0}")]
    EntityNotFound(Entity),

    /// The entity exists but does not carry the requested component.
    #[error("Component {component} not present on entity {entity}")]
    ComponentNotPresent {
        /// Entity that was queried.
        entity: Entity,
        /// Name of the missing component type.
        component: &'static str,
    },

    /// A matcher referenced a component type that was never registered.
    #[error("Component type {0} is not registered")]
    UnregisteredComponent(&'static str),

    /// Two different types tried to register under the same name.
    #[error("Component name {0} is already registered by another type")]
    DuplicateRegistration(String),

    /// The matcher's `all_of`, `any_of` and `none_of` sets overlap.
    #[error("Invalid matcher: {0}")]
    InvalidMatcher(String),

    /// No subscription with this identifier is active.
    #[error("Unknown subscription: {0:?}")]
    UnknownSubscription(SubscriptionId),

    /// Restoring a snapshot would collide with an existing name.
    #[error("Snapshot name collision: {0}")]
    SnapshotNameCollision(String),

    /// A snapshot lists the same component type twice for one entity.
    #[error("Snapshot entity {entity} carries component {component} twice")]
    DuplicateSnapshotComponent {
        /// Name of the offending entity.
        entity: String,
        /// Repeated component type name.
        component: String,
    },

    /// A snapshot carries a component type the registry does not know.
    #[error("Unknown component type in snapshot: {0}")]
    UnknownComponentType(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for EcsError {
    fn from(err: serde_json::Error) -> Self {
        EcsError::Serialization(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, EcsError>;
