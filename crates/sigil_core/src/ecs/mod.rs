//! # Entity Component System
//!
//! ## Design Philosophy
//!
//! - Pools are pre-sized to the world's entity capacity and indexed by id
//! - Ownership is recorded twice: in the pool's active set and in the
//!   entity's signature bit. Every mutating world operation keeps both equal
//! - Type-erased pools sit behind [`pool::AnyPool`]; typed access goes
//!   through a checked downcast
//! - Systems never hold the world. They borrow it through a
//!   [`SystemContext`] for the duration of one entry call

pub mod commands;
pub mod entity;
pub mod pool;
pub mod signature;
pub mod system;
pub mod types;
pub mod world;

pub use commands::CommandBuffer;
pub use entity::{Entity, EntityAllocator};
pub use pool::{AnyPool, Component, ComponentPool};
pub use signature::Signature;
pub use system::{
    Capability, Destroy, DestroySystem, Handles, Init, InitSystem, Run, RunSystem, System,
    SystemCollection, SystemContext, Systems,
};
pub use types::{type_index, TypeIndex, TypeRegistry};
pub use world::{MaskBuilder, PoolView, World};
