//! # ECS World
//!
//! The central container for entities, signatures and component pools.
//!
//! ## Invariant
//!
//! For every registered component type `C` at bit position `p` and every
//! entity `e`:
//!
//! ```text
//! pool(C).is_active(e)  <=>  signature(e).get(p)
//! ```
//!
//! Every mutating operation below preserves it.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;

use super::entity::{Entity, EntityAllocator};
use super::pool::{AnyPool, Component, ComponentPool};
use super::signature::Signature;
use super::types::{type_index, TypeIndex};
use crate::config::WorldConfig;
use crate::error::{EcsError, EcsResult};

/// Default entity capacity.
pub const DEFAULT_ENTITY_CAPACITY: u32 = 5000;
/// Default component-type capacity.
pub const DEFAULT_COMPONENT_CAPACITY: usize = 32;

/// The ECS World - container for all entity and component state.
///
/// # Capacity
///
/// Pools and signatures are sized to the entity capacity, which can be
/// changed through [`World::resize_entities`]. The number of component types
/// is bounded by the component capacity, see [`World::resize_components`].
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new(1_000, 16);
/// world.register_component::<Position>()?;
///
/// let entity = world.create_entity()?;
/// world.add_component(entity, Position::new(1.0, 2.0, 3.0))?;
/// ```
pub struct World {
    /// Free-id set and live count.
    entities: EntityAllocator,
    /// One signature per entity slot; empty for dead slots.
    signatures: Vec<Signature>,
    /// Upper bound on registered component types.
    component_capacity: usize,
    /// Component type to bit position.
    bits: HashMap<TypeIndex, usize>,
    /// Pools indexed by bit position, in registration order.
    pools: Vec<Box<dyn AnyPool>>,
}

impl World {
    /// Creates a world.
    ///
    /// # Arguments
    ///
    /// * `entity_capacity` - Number of entity ids available up front
    /// * `component_capacity` - Number of component types that can be registered
    #[must_use]
    pub fn new(entity_capacity: u32, component_capacity: usize) -> Self {
        tracing::debug!(entity_capacity, component_capacity, "creating world");

        let entities = EntityAllocator::new(entity_capacity);
        let signatures = vec![Signature::default(); entities.capacity()];

        Self {
            entities,
            signatures,
            component_capacity,
            bits: HashMap::with_capacity(component_capacity),
            pools: Vec::with_capacity(component_capacity),
        }
    }

    /// Creates a world from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the configuration is invalid.
    pub fn from_config(config: &WorldConfig) -> EcsResult<Self> {
        config.validate()?;
        let entity_capacity = u32::try_from(config.entity_capacity).map_err(|_| {
            EcsError::InvalidConfig(format!(
                "entity capacity {} exceeds u32::MAX",
                config.entity_capacity
            ))
        })?;
        Ok(Self::new(entity_capacity, config.component_capacity))
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Returns the entity capacity.
    #[inline]
    #[must_use]
    pub const fn entity_capacity(&self) -> usize {
        self.entities.capacity()
    }

    /// Returns the number of alive entities.
    #[inline]
    #[must_use]
    pub const fn entity_count(&self) -> usize {
        self.entities.alive_count()
    }

    fn check_alive(&self, entity: Entity) -> EcsResult<()> {
        self.entities.check_range(entity)?;
        if !self.entities.is_alive(entity) {
            return Err(EcsError::EntityNotAlive(entity));
        }
        Ok(())
    }

    /// Creates an entity with an all-false signature.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityCapacityExhausted`] if no id is available.
    pub fn create_entity(&mut self) -> EcsResult<Entity> {
        let entity = self.entities.allocate()?;
        self.signatures[entity.slot()] =
            Signature::with_capacity(self.pools.len(), self.component_capacity);
        tracing::trace!(%entity, "entity created");
        Ok(entity)
    }

    /// Destroys an entity, stripping every component it owns.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`] or [`EcsError::EntityNotAlive`].
    pub fn destroy_entity(&mut self, entity: Entity) -> EcsResult<()> {
        self.check_alive(entity)?;
        self.remove_all_components(entity)?;

        self.signatures[entity.slot()].clear();
        self.entities.release(entity)?;
        tracing::trace!(%entity, "entity destroyed");
        Ok(())
    }

    /// Checks whether `entity` is alive.
    #[inline]
    #[must_use]
    pub fn exists_entity(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Iterates over alive entities in ascending order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter_alive()
    }

    /// Returns the signature of an alive entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`] or [`EcsError::EntityNotAlive`].
    pub fn signature(&self, entity: Entity) -> EcsResult<&Signature> {
        self.check_alive(entity)?;
        Ok(&self.signatures[entity.slot()])
    }

    // =========================================================================
    // Component registration
    // =========================================================================

    /// Returns the component-type capacity.
    #[inline]
    #[must_use]
    pub const fn component_capacity(&self) -> usize {
        self.component_capacity
    }

    /// Returns the number of registered component types.
    #[inline]
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.pools.len()
    }

    /// Registers `C`, assigning it the next bit position.
    ///
    /// The new pool is sized to the current entity capacity and every live
    /// signature grows by one clear bit.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentAlreadyRegistered`] or
    /// [`EcsError::ComponentCapacityExhausted`].
    pub fn register_component<C: Component>(&mut self) -> EcsResult<()> {
        let index = type_index::<C>();
        if self.bits.contains_key(&index) {
            return Err(EcsError::ComponentAlreadyRegistered(type_name::<C>()));
        }
        if self.pools.len() >= self.component_capacity {
            return Err(EcsError::ComponentCapacityExhausted {
                capacity: self.component_capacity,
            });
        }

        let bit = self.pools.len();
        self.pools
            .push(Box::new(ComponentPool::<C>::new(self.entities.capacity())));
        self.bits.insert(index, bit);

        let width = self.pools.len();
        for entity in self.entities.iter_alive() {
            self.signatures[entity.slot()].resize(width, false);
        }

        tracing::debug!(component = type_name::<C>(), bit, "component registered");
        Ok(())
    }

    /// Checks whether `C` is registered.
    #[must_use]
    pub fn is_registered<C: Component>(&self) -> bool {
        self.bits.contains_key(&type_index::<C>())
    }

    /// Returns the bit position assigned to `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`].
    pub fn component_bit<C: Component>(&self) -> EcsResult<usize> {
        self.bits
            .get(&type_index::<C>())
            .copied()
            .ok_or(EcsError::ComponentNotRegistered(type_name::<C>()))
    }

    /// Iterates over registered component type names in bit order.
    pub fn registered_components(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pools.iter().map(|pool| pool.type_name())
    }

    // =========================================================================
    // Pools
    // =========================================================================

    fn downcast<C: Component>(pool: &dyn AnyPool) -> EcsResult<&ComponentPool<C>> {
        pool.as_any()
            .downcast_ref::<ComponentPool<C>>()
            .ok_or(EcsError::PoolTypeMismatch(type_name::<C>()))
    }

    fn downcast_mut<C: Component>(pool: &mut dyn AnyPool) -> EcsResult<&mut ComponentPool<C>> {
        pool.as_any_mut()
            .downcast_mut::<ComponentPool<C>>()
            .ok_or(EcsError::PoolTypeMismatch(type_name::<C>()))
    }

    /// Returns the pool of `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`].
    pub fn pool<C: Component>(&self) -> EcsResult<&ComponentPool<C>> {
        let bit = self.component_bit::<C>()?;
        Self::downcast(self.pools[bit].as_ref())
    }

    /// Returns the pool of `C` mutably.
    ///
    /// Only slot data can change through it: the pool's active set is
    /// reachable mutably only through the world's component operations.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`].
    pub fn pool_mut<C: Component>(&mut self) -> EcsResult<PoolView<'_, C>> {
        let bit = self.component_bit::<C>()?;
        Self::downcast_mut(self.pools[bit].as_mut()).map(PoolView)
    }

    /// Returns the pool of `C`, registering `C` first if needed.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentCapacityExhausted`] if `C` is new and no
    /// bit position is left.
    pub fn pool_or_register<C: Component>(&mut self) -> EcsResult<PoolView<'_, C>> {
        if !self.is_registered::<C>() {
            self.register_component::<C>()?;
        }
        self.pool_mut::<C>()
    }

    /// Returns two distinct pools mutably at once.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::AliasedPool`] if `A` and `B` are the same type,
    /// [`EcsError::ComponentNotRegistered`] if either is unregistered.
    pub fn pool_pair_mut<A: Component, B: Component>(
        &mut self,
    ) -> EcsResult<(PoolView<'_, A>, PoolView<'_, B>)> {
        let a = self.component_bit::<A>()?;
        let b = self.component_bit::<B>()?;
        if a == b {
            return Err(EcsError::AliasedPool(type_name::<A>()));
        }

        let (first, second) = if a < b {
            let (left, right) = self.pools.split_at_mut(b);
            (left[a].as_mut(), right[0].as_mut())
        } else {
            let (left, right) = self.pools.split_at_mut(a);
            (right[0].as_mut(), left[b].as_mut())
        };

        Ok((
            PoolView(Self::downcast_mut::<A>(first)?),
            PoolView(Self::downcast_mut::<B>(second)?),
        ))
    }

    /// Deep-copies the pool of `C` into an independent store.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`].
    pub fn clone_pool<C: Component + Clone>(&self) -> EcsResult<ComponentPool<C>> {
        self.pool::<C>().map(Clone::clone)
    }

    // =========================================================================
    // Components
    // =========================================================================

    fn owns_bit(&self, entity: Entity, bit: usize) -> EcsResult<bool> {
        self.signatures[entity.slot()].get(bit)
    }

    /// Attaches `component` to `entity`. Strict: fails if already owned.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentAlreadyPresent`], along with the entity
    /// and registration errors of [`World::insert_component`].
    pub fn add_component<C: Component>(&mut self, entity: Entity, component: C) -> EcsResult<()> {
        self.check_alive(entity)?;
        let bit = self.component_bit::<C>()?;
        if self.owns_bit(entity, bit)? {
            return Err(EcsError::ComponentAlreadyPresent {
                entity,
                component: type_name::<C>(),
            });
        }
        self.write_component(entity, bit, component)
    }

    /// Attaches or overwrites `component` on `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`], [`EcsError::EntityNotAlive`]
    /// or [`EcsError::ComponentNotRegistered`].
    pub fn insert_component<C: Component>(
        &mut self,
        entity: Entity,
        component: C,
    ) -> EcsResult<()> {
        self.check_alive(entity)?;
        let bit = self.component_bit::<C>()?;
        self.write_component(entity, bit, component)
    }

    fn write_component<C: Component>(
        &mut self,
        entity: Entity,
        bit: usize,
        component: C,
    ) -> EcsResult<()> {
        Self::downcast_mut::<C>(self.pools[bit].as_mut())?.insert_component(entity, component)?;
        self.signatures[entity.slot()].set(bit, true)
    }

    /// Detaches `C` from `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentMissing`] if `entity` does not own `C`,
    /// along with the entity and registration errors.
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> EcsResult<()> {
        self.check_alive(entity)?;
        let bit = self.component_bit::<C>()?;
        if !self.owns_bit(entity, bit)? {
            return Err(EcsError::ComponentMissing {
                entity,
                component: type_name::<C>(),
            });
        }
        self.signatures[entity.slot()].set(bit, false)?;
        self.pools[bit].remove(entity)
    }

    /// Detaches every component `entity` owns.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`] or [`EcsError::EntityNotAlive`].
    pub fn remove_all_components(&mut self, entity: Entity) -> EcsResult<()> {
        self.check_alive(entity)?;
        let signature = &mut self.signatures[entity.slot()];
        for bit in signature.ones() {
            self.pools[bit].remove(entity)?;
        }
        signature.reset(false);
        Ok(())
    }

    /// Checks whether `entity` owns `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`], [`EcsError::EntityNotAlive`]
    /// or [`EcsError::ComponentNotRegistered`].
    pub fn contains_component<C: Component>(&self, entity: Entity) -> EcsResult<bool> {
        self.check_alive(entity)?;
        let bit = self.component_bit::<C>()?;
        self.owns_bit(entity, bit)
    }

    /// Returns the slot of `C` for `entity`.
    ///
    /// Only the range and registration are checked; callers verify
    /// ownership with [`World::contains_component`] first.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`] or
    /// [`EcsError::ComponentNotRegistered`].
    pub fn get_component<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        self.entities.check_range(entity)?;
        self.pool::<C>()?.get_component(entity)
    }

    /// Returns the mutable slot of `C` for `entity`.
    ///
    /// Only the range and registration are checked.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`] or
    /// [`EcsError::ComponentNotRegistered`].
    pub fn get_component_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.entities.check_range(entity)?;
        let bit = self.component_bit::<C>()?;
        Self::downcast_mut::<C>(self.pools[bit].as_mut())?.get_component_mut(entity)
    }

    // =========================================================================
    // Matching
    // =========================================================================

    /// Starts a component mask at the current registered width.
    #[must_use]
    pub fn mask(&self) -> MaskBuilder<'_> {
        MaskBuilder {
            world: self,
            mask: Signature::new(self.pools.len()),
        }
    }

    /// Checks whether `entity` owns every component set in `mask`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`] or [`EcsError::EntityNotAlive`].
    pub fn matches(&self, entity: Entity, mask: &Signature) -> EcsResult<bool> {
        Ok(self.signature(entity)?.is_superset_of(mask))
    }

    /// Iterates over alive entities owning every component set in `mask`.
    pub fn entities_matching<'a>(
        &'a self,
        mask: &'a Signature,
    ) -> impl Iterator<Item = Entity> + 'a {
        self.entities
            .iter_alive()
            .filter(move |entity| self.signatures[entity.slot()].is_superset_of(mask))
    }

    // =========================================================================
    // Capacity
    // =========================================================================

    /// Grows or shrinks the entity capacity, resizing every signature slot
    /// and pool in lockstep.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityStillAlive`] if shrinking would drop a live
    /// entity.
    pub fn resize_entities(&mut self, new_capacity: usize) -> EcsResult<()> {
        self.entities.resize(new_capacity)?;
        self.signatures.resize_with(new_capacity, Signature::default);
        for pool in &mut self.pools {
            pool.resize(new_capacity);
        }
        tracing::debug!(new_capacity, "entity capacity resized");
        Ok(())
    }

    /// Changes the component-type capacity and reserves signature room.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentCapacityTooSmall`] if `new_capacity` is
    /// below the registered count.
    pub fn resize_components(&mut self, new_capacity: usize) -> EcsResult<()> {
        if new_capacity < self.pools.len() {
            return Err(EcsError::ComponentCapacityTooSmall {
                requested: new_capacity,
                registered: self.pools.len(),
            });
        }

        self.component_capacity = new_capacity;
        self.bits.reserve(new_capacity.saturating_sub(self.bits.len()));
        self.pools
            .reserve(new_capacity.saturating_sub(self.pools.len()));
        for entity in self.entities.iter_alive() {
            self.signatures[entity.slot()].reserve(new_capacity);
        }
        tracing::debug!(new_capacity, "component capacity resized");
        Ok(())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(DEFAULT_ENTITY_CAPACITY, DEFAULT_COMPONENT_CAPACITY)
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.entity_count())
            .field("entity_capacity", &self.entity_capacity())
            .field("component_capacity", &self.component_capacity)
            .field("components", &self.registered_components().collect::<Vec<_>>())
            .finish()
    }
}

/// Mutable access to a pool's slots without access to its active set.
///
/// Handed out by the world so that ownership changes always go through the
/// world and keep signatures in sync.
pub struct PoolView<'w, C: Component>(&'w mut ComponentPool<C>);

impl<'w, C: Component> PoolView<'w, C> {
    /// Returns the mutable slot of `entity`, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`].
    pub fn get_component_mut(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.0.get_component_mut(entity)
    }

    /// Iterates mutably over active slots in ascending id order.
    pub fn iter_active_mut(&mut self) -> super::pool::ActiveIterMut<'_, C> {
        self.0.iter_active_mut()
    }

    /// Iterates mutably over every slot, active or not.
    pub fn iter_all_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> {
        self.0.iter_all_mut()
    }

    /// Consumes the view, returning the active iterator for the full borrow.
    pub fn into_iter_active_mut(self) -> super::pool::ActiveIterMut<'w, C> {
        self.0.iter_active_mut()
    }
}

impl<C: Component> std::ops::Deref for PoolView<'_, C> {
    type Target = ComponentPool<C>;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

/// Builds a component mask for [`World::matches`] and
/// [`World::entities_matching`].
pub struct MaskBuilder<'w> {
    world: &'w World,
    mask: Signature,
}

impl MaskBuilder<'_> {
    /// Adds `C` to the mask.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotRegistered`].
    pub fn with<C: Component>(mut self) -> EcsResult<Self> {
        let bit = self.world.component_bit::<C>()?;
        self.mask.set(bit, true)?;
        Ok(self)
    }

    /// Finishes the mask.
    #[must_use]
    pub fn build(self) -> Signature {
        self.mask
    }
}
