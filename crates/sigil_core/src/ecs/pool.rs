//! # Component Pools
//!
//! Dense, entity-indexed storage for one component type.
//!
//! - Every possible entity id owns a slot, valid or not
//! - Access is O(1) via entity index
//! - An ordered active set records which slots hold meaningful data
//!
//! Removing a component only drops the id from the active set; the slot may
//! keep stale data, which never surfaces through active iteration.

use std::any::{type_name, Any};
use std::collections::{btree_set, BTreeSet};
use std::iter::Copied;

use super::entity::Entity;
use crate::error::{EcsError, EcsResult};

/// Marker trait for ECS components.
///
/// Components are plain values. `Default` provides the value of slots that
/// were never written.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Default)]
/// struct Position {
///     x: f32,
///     y: f32,
///     z: f32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: Default + 'static {}

/// Type-erased lifecycle operations shared by every pool.
///
/// The world keeps its pools behind this trait and recovers the typed
/// [`ComponentPool`] through [`AnyPool::as_any`].
pub trait AnyPool {
    /// Resizes the backing array to `capacity` slots.
    fn resize(&mut self, capacity: usize);
    /// Drops every slot and active id.
    fn clear(&mut self);
    /// Removes `entity` from the active set.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotActive`] if `entity` is not active.
    fn remove(&mut self, entity: Entity) -> EcsResult<()>;
    /// Checks whether `entity` is in the active set.
    fn is_active(&self, entity: Entity) -> bool;
    /// Returns the number of active ids.
    fn active_count(&self) -> usize;
    /// Returns the number of slots.
    fn capacity(&self) -> usize;
    /// Returns the component type name.
    fn type_name(&self) -> &'static str;
    /// Upcast for typed downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for typed downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense storage for a single component type.
///
/// # Type Parameters
///
/// * `C` - The component type to store
///
/// # Example
///
/// ```rust,ignore
/// let mut pool: ComponentPool<Position> = ComponentPool::new(1024);
/// pool.insert_component(Entity::new(3), Position::new(1.0, 2.0, 3.0))?;
/// for (entity, position) in pool.iter_active() { /* ... */ }
/// ```
#[derive(Debug, Default)]
pub struct ComponentPool<C: Component> {
    /// One slot per entity id.
    data: Vec<C>,
    /// Ids whose slots hold live data, ascending.
    active: BTreeSet<Entity>,
}

impl<C: Component> ComponentPool<C> {
    /// Creates a pool with `capacity` default slots.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let mut pool = Self {
            data: Vec::new(),
            active: BTreeSet::new(),
        };
        pool.resize(capacity);
        pool
    }

    /// Returns the number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the number of active slots.
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Checks whether `entity` is in the active set.
    #[inline]
    #[must_use]
    pub fn is_active(&self, entity: Entity) -> bool {
        self.active.contains(&entity)
    }

    /// Reserves room for at least `capacity` slots in total.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.data.len() {
            self.data.reserve(capacity - self.data.len());
        }
    }

    /// Resizes to `capacity` slots.
    ///
    /// New slots hold the default value. Truncated slots leave the active set.
    pub fn resize(&mut self, capacity: usize) {
        self.data.resize_with(capacity, C::default);
        if let Ok(end) = u32::try_from(capacity) {
            drop(self.active.split_off(&Entity::new(end)));
        }
    }

    /// Releases unused backing capacity.
    pub fn shrink_to_fit(&mut self) {
        self.data.shrink_to_fit();
    }

    /// Drops every slot and active id.
    pub fn clear(&mut self) {
        self.data.clear();
        self.active.clear();
    }

    /// Clears the pool and releases its storage.
    pub fn reset(&mut self) {
        self.clear();
        self.shrink_to_fit();
    }

    #[inline]
    fn check_range(&self, entity: Entity) -> EcsResult<()> {
        if entity.slot() >= self.data.len() {
            return Err(EcsError::EntityOutOfRange {
                entity,
                capacity: self.data.len(),
            });
        }
        Ok(())
    }

    /// Overwrites the slot of `entity` and marks it active.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`] if `entity >= capacity`.
    pub fn insert_component(&mut self, entity: Entity, component: C) -> EcsResult<()> {
        self.check_range(entity)?;
        self.data[entity.slot()] = component;
        self.active.insert(entity);
        Ok(())
    }

    /// Removes `entity` from the active set.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotActive`] if `entity` is not active.
    pub fn remove_component(&mut self, entity: Entity) -> EcsResult<()> {
        if !self.active.remove(&entity) {
            return Err(EcsError::ComponentNotActive {
                entity,
                component: type_name::<C>(),
            });
        }
        Ok(())
    }

    /// Returns the slot of `entity`, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`] if `entity >= capacity`.
    #[inline]
    pub fn get_component(&self, entity: Entity) -> EcsResult<&C> {
        self.check_range(entity)?;
        Ok(&self.data[entity.slot()])
    }

    /// Returns the mutable slot of `entity`, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`] if `entity >= capacity`.
    #[inline]
    pub fn get_component_mut(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.check_range(entity)?;
        Ok(&mut self.data[entity.slot()])
    }

    /// Returns a slice of every slot.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[C] {
        &self.data
    }

    /// Iterates over active ids in ascending order.
    pub fn active_entities(&self) -> Copied<btree_set::Iter<'_, Entity>> {
        self.active.iter().copied()
    }

    /// Iterates over every slot with its entity, active or not.
    pub fn iter_all(&self) -> impl Iterator<Item = (Entity, &C)> {
        self.data
            .iter()
            .enumerate()
            .filter_map(|(slot, component)| Some((Entity::new(u32::try_from(slot).ok()?), component)))
    }

    /// Iterates mutably over every slot with its entity, active or not.
    pub fn iter_all_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> {
        self.data
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, component)| Some((Entity::new(u32::try_from(slot).ok()?), component)))
    }

    /// Iterates over active slots in ascending id order.
    pub fn iter_active(&self) -> impl Iterator<Item = (Entity, &C)> {
        let data = &self.data;
        self.active
            .iter()
            .filter_map(move |&entity| data.get(entity.slot()).map(|component| (entity, component)))
    }

    /// Iterates mutably over active slots in ascending id order.
    ///
    /// Runs in O(active). Structural changes are impossible while the
    /// iterator borrows the pool.
    pub fn iter_active_mut(&mut self) -> ActiveIterMut<'_, C> {
        ActiveIterMut {
            ids: self.active.iter(),
            slots: &mut self.data,
            offset: 0,
        }
    }
}

impl<C: Component + Clone> Clone for ComponentPool<C> {
    /// Deep copy of every slot and the active set.
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            active: self.active.clone(),
        }
    }
}

impl<C: Component> AnyPool for ComponentPool<C> {
    fn resize(&mut self, capacity: usize) {
        ComponentPool::resize(self, capacity);
    }

    fn clear(&mut self) {
        ComponentPool::clear(self);
    }

    fn remove(&mut self, entity: Entity) -> EcsResult<()> {
        self.remove_component(entity)
    }

    fn is_active(&self, entity: Entity) -> bool {
        ComponentPool::is_active(self, entity)
    }

    fn active_count(&self) -> usize {
        ComponentPool::active_count(self)
    }

    fn capacity(&self) -> usize {
        ComponentPool::capacity(self)
    }

    fn type_name(&self) -> &'static str {
        type_name::<C>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Mutable iterator over the active slots of a [`ComponentPool`].
pub struct ActiveIterMut<'a, C> {
    /// Remaining active ids, ascending.
    ids: btree_set::Iter<'a, Entity>,
    /// Slots from `offset` onwards not yet handed out.
    slots: &'a mut [C],
    /// Slot index of `slots[0]`.
    offset: usize,
}

impl<'a, C> Iterator for ActiveIterMut<'a, C> {
    type Item = (Entity, &'a mut C);

    fn next(&mut self) -> Option<Self::Item> {
        let entity = *self.ids.next()?;
        let skip = entity.slot().checked_sub(self.offset)?;

        let slots = std::mem::take(&mut self.slots);
        let (component, rest) = slots.get_mut(skip..)?.split_first_mut()?;

        self.slots = rest;
        self.offset = entity.slot() + 1;
        Some((entity, component))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ids.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[allow(dead_code)]
    #[derive(Default)]
    struct Marker;
    impl Component for Marker {}

    #[test]
    fn test_pool_creation() {
        let pool: ComponentPool<Position> = ComponentPool::new(100);
        assert_eq!(pool.capacity(), 100);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(*pool.get_component(Entity::new(99)).unwrap(), Position::default());
    }

    #[test]
    fn test_insert_remove() {
        let mut pool: ComponentPool<Position> = ComponentPool::new(10);
        let e = Entity::new(4);

        pool.insert_component(e, Position { x: 1.0, y: 2.0 }).unwrap();
        assert!(pool.is_active(e));
        assert_eq!(pool.get_component(e).unwrap().x, 1.0);

        // Insert overwrites unconditionally
        pool.insert_component(e, Position { x: 5.0, y: 5.0 }).unwrap();
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.get_component(e).unwrap().x, 5.0);

        pool.remove_component(e).unwrap();
        assert!(!pool.is_active(e));
        assert!(matches!(
            pool.remove_component(e),
            Err(EcsError::ComponentNotActive { .. })
        ));
    }

    #[test]
    fn test_bounds() {
        let mut pool: ComponentPool<Position> = ComponentPool::new(3);
        assert!(matches!(
            pool.insert_component(Entity::new(3), Position::default()),
            Err(EcsError::EntityOutOfRange { capacity: 3, .. })
        ));
        assert!(pool.get_component(Entity::new(3)).is_err());
        assert!(pool.get_component_mut(Entity::new(2)).is_ok());
    }

    #[test]
    fn test_active_iteration_is_ascending() {
        let mut pool: ComponentPool<Position> = ComponentPool::new(8);
        for index in [6, 1, 3] {
            pool.insert_component(Entity::new(index), Position { x: index as f32, y: 0.0 })
                .unwrap();
        }

        let ids: Vec<u32> = pool.iter_active().map(|(e, _)| e.index()).collect();
        assert_eq!(ids, vec![1, 3, 6]);

        for (_, position) in pool.iter_active_mut() {
            position.y += 1.0;
        }
        assert_eq!(pool.iter_active().filter(|(_, p)| p.y == 1.0).count(), 3);
        assert_eq!(pool.get_component(Entity::new(0)).unwrap().y, 0.0);
        assert_eq!(pool.iter_all().count(), 8);
    }

    #[test]
    fn test_removed_slot_hidden_from_active_iteration() {
        let mut pool: ComponentPool<Position> = ComponentPool::new(4);
        pool.insert_component(Entity::new(2), Position { x: 9.0, y: 9.0 }).unwrap();
        pool.remove_component(Entity::new(2)).unwrap();

        assert_eq!(pool.iter_active().count(), 0);
        assert_eq!(pool.iter_active_mut().count(), 0);
    }

    #[test]
    fn test_resize_truncates_active_set() {
        let mut pool: ComponentPool<Position> = ComponentPool::new(10);
        pool.insert_component(Entity::new(1), Position::default()).unwrap();
        pool.insert_component(Entity::new(8), Position::default()).unwrap();

        pool.resize(5);
        assert_eq!(pool.capacity(), 5);
        assert!(pool.is_active(Entity::new(1)));
        assert!(!pool.is_active(Entity::new(8)));

        pool.resize(20);
        assert_eq!(pool.capacity(), 20);
        assert_eq!(pool.active_count(), 1);

        pool.reset();
        assert_eq!(pool.capacity(), 0);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original: ComponentPool<Position> = ComponentPool::new(4);
        original.insert_component(Entity::new(0), Position { x: 1.0, y: 1.0 }).unwrap();

        let mut copy = original.clone();
        copy.get_component_mut(Entity::new(0)).unwrap().x = 42.0;
        copy.remove_component(Entity::new(0)).unwrap();

        assert_eq!(original.get_component(Entity::new(0)).unwrap().x, 1.0);
        assert!(original.is_active(Entity::new(0)));
    }

    #[test]
    fn test_type_erased_downcast() {
        let mut pool: Box<dyn AnyPool> = Box::new(ComponentPool::<Position>::new(2));
        pool.resize(6);
        assert_eq!(pool.capacity(), 6);
        assert!(pool.type_name().ends_with("Position"));

        let typed = pool
            .as_any_mut()
            .downcast_mut::<ComponentPool<Position>>()
            .unwrap();
        typed.insert_component(Entity::new(5), Position::default()).unwrap();
        assert!(pool.is_active(Entity::new(5)));
        assert!(pool.as_any().downcast_ref::<ComponentPool<Marker>>().is_none());
    }
}
