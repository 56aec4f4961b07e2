//! # SIGIL Core Runtime
//!
//! Entity Component System runtime built around three ideas:
//! - Entities are plain integer handles drawn from a capacity-bounded pool
//! - Each entity carries a packed bit [`Signature`] naming the component
//!   types it owns, so membership tests are O(1)
//! - Every component type lives in its own dense [`ComponentPool`], sized to
//!   the world's entity capacity, with an explicit active set
//!
//! Systems are grouped by capability (init, run, destroy or user defined)
//! and executed in batches against the [`World`] owned by [`Systems`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use sigil_core::{Component, World};
//!
//! #[derive(Default)]
//! struct Position { x: f32, y: f32, z: f32 }
//! impl Component for Position {}
//!
//! let mut world = World::new(1024, 32);
//! world.register_component::<Position>()?;
//! let entity = world.create_entity()?;
//! world.add_component(entity, Position { x: 1.0, y: 2.0, z: 3.0 })?;
//! assert!(world.contains_component::<Position>(entity)?);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::WorldConfig;
pub use ecs::{
    type_index, Capability, CommandBuffer, Component, ComponentPool, Destroy, DestroySystem,
    Entity, Handles, Init, InitSystem, MaskBuilder, PoolView, Run, RunSystem, Signature, System,
    SystemCollection, SystemContext, Systems, TypeIndex, TypeRegistry, World,
};
pub use error::{EcsError, EcsResult};
