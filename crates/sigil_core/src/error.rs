//! # ECS Error Types
//!
//! Every contract violation the runtime can detect is reported through
//! [`EcsError`] instead of aborting.

use thiserror::Error;

use crate::ecs::Entity;

/// Errors that can occur in the ECS runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Entity id is not below the current entity capacity.
    #[error("entity {entity} out of range: capacity {capacity}")]
    EntityOutOfRange {
        /// The offending entity.
        entity: Entity,
        /// Current entity capacity.
        capacity: usize,
    },

    /// Entity is in range but not currently alive.
    #[error("entity {0} is not alive")]
    EntityNotAlive(Entity),

    /// No free entity id left; grow the world first.
    #[error("entity capacity exhausted: all {capacity} ids are alive")]
    EntityCapacityExhausted {
        /// Current entity capacity.
        capacity: usize,
    },

    /// Shrinking the entity capacity would drop a live entity.
    #[error("cannot shrink entity capacity to {new_capacity}: entity {entity} is alive")]
    EntityStillAlive {
        /// First live entity found in the truncated range.
        entity: Entity,
        /// Requested capacity.
        new_capacity: usize,
    },

    /// Bit index is not below the signature length.
    #[error("bit index {index} out of range: length {len}")]
    BitOutOfRange {
        /// The offending bit index.
        index: usize,
        /// Signature length in bits.
        len: usize,
    },

    /// Requested bit scan range is malformed or exceeds the signature.
    #[error("invalid bit range {start}..{end} for length {len}")]
    InvalidBitRange {
        /// Range start.
        start: usize,
        /// Range end (exclusive).
        end: usize,
        /// Signature length in bits.
        len: usize,
    },

    /// Component type was never registered with this world.
    #[error("component {0} is not registered")]
    ComponentNotRegistered(&'static str),

    /// Component type is already registered with this world.
    #[error("component {0} is already registered")]
    ComponentAlreadyRegistered(&'static str),

    /// Every component bit position is taken.
    #[error("component capacity exhausted: {capacity} types registered")]
    ComponentCapacityExhausted {
        /// Current component-type capacity.
        capacity: usize,
    },

    /// Shrinking the component capacity below the registered count.
    #[error("component capacity {requested} is below the {registered} registered types")]
    ComponentCapacityTooSmall {
        /// Requested capacity.
        requested: usize,
        /// Number of registered component types.
        registered: usize,
    },

    /// Strict add of a component the entity already owns.
    #[error("entity {entity} already owns component {component}")]
    ComponentAlreadyPresent {
        /// Target entity.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// Removal of a component the entity does not own.
    #[error("entity {entity} does not own component {component}")]
    ComponentMissing {
        /// Target entity.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// Pool removal of an id outside the active set.
    #[error("entity {entity} is not active in pool {component}")]
    ComponentNotActive {
        /// Target entity.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// Two mutable borrows of the same pool were requested.
    #[error("pool {0} requested twice in one mutable borrow")]
    AliasedPool(&'static str),

    /// Pool stored under a type index holds a different component type.
    #[error("pool type mismatch: expected {0}")]
    PoolTypeMismatch(&'static str),

    /// System type is not registered.
    #[error("system {0} not found")]
    SystemNotFound(&'static str),

    /// System type is already registered.
    #[error("system {0} is already registered")]
    SystemAlreadyRegistered(&'static str),

    /// No collection exists for the capability.
    #[error("collection for capability {0} not found")]
    CollectionNotFound(&'static str),

    /// A collection for the capability already exists.
    #[error("collection for capability {0} already exists")]
    CollectionAlreadyExists(&'static str),

    /// System already belongs to the collection.
    #[error("system {system} already in collection {capability}")]
    SystemAlreadyInCollection {
        /// System type name.
        system: &'static str,
        /// Capability type name.
        capability: &'static str,
    },

    /// System does not belong to the collection.
    #[error("system {system} not in collection {capability}")]
    SystemNotInCollection {
        /// System type name.
        system: &'static str,
        /// Capability type name.
        capability: &'static str,
    },

    /// Invalid world configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
