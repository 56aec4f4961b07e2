//! # Entity Management
//!
//! Entities are bare indices into the world's pools and signatures. A
//! capacity-bounded free-id set hands them out smallest first and takes
//! them back on destruction.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{EcsError, EcsResult};

/// Opaque entity handle in `[0, capacity)`.
///
/// Carries no payload. Composition exists only through the entity's
/// signature and the per-type pools. Ids are recycled after destruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// Creates an entity handle from a raw index.
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Returns the index as a slot position.
    #[inline]
    #[must_use]
    pub const fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Entity {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

/// Capacity-bounded entity id allocator.
///
/// An id is never alive and available at the same time.
#[derive(Debug, Clone, Default)]
pub struct EntityAllocator {
    /// Ids that can be handed out, smallest first.
    available: BTreeSet<u32>,
    /// Number of currently alive entities.
    alive_count: usize,
    /// Upper bound on ids.
    capacity: usize,
}

impl EntityAllocator {
    /// Creates an allocator with every id in `[0, capacity)` available.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            available: (0..capacity).collect(),
            alive_count: 0,
            capacity: capacity as usize,
        }
    }

    /// Returns the id capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Returns the number of ids still available.
    #[inline]
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    /// Takes the smallest available id.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityCapacityExhausted`] if every id is alive.
    pub fn allocate(&mut self) -> EcsResult<Entity> {
        let Some(index) = self.available.pop_first() else {
            return Err(EcsError::EntityCapacityExhausted {
                capacity: self.capacity,
            });
        };
        self.alive_count += 1;
        Ok(Entity(index))
    }

    /// Returns an alive id to the available set.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`] for ids beyond capacity and
    /// [`EcsError::EntityNotAlive`] for ids that are already available.
    pub fn release(&mut self, entity: Entity) -> EcsResult<()> {
        self.check_range(entity)?;
        if !self.is_alive(entity) {
            return Err(EcsError::EntityNotAlive(entity));
        }
        self.available.insert(entity.0);
        self.alive_count -= 1;
        Ok(())
    }

    /// Checks whether `entity` is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        if entity.slot() >= self.capacity {
            return false;
        }
        if self.alive_count == 0 {
            return false;
        }
        !self.available.contains(&entity.0)
    }

    /// Checks that `entity` lies below the capacity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityOutOfRange`] if `entity >= capacity`.
    #[inline]
    pub fn check_range(&self, entity: Entity) -> EcsResult<()> {
        if entity.slot() >= self.capacity {
            return Err(EcsError::EntityOutOfRange {
                entity,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Iterates over alive entities in ascending order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        (0..self.capacity)
            .filter_map(|slot| u32::try_from(slot).ok())
            .filter(|index| !self.available.contains(index))
            .map(Entity)
    }

    /// Grows or shrinks the id capacity.
    ///
    /// Growth makes every new id available. Shrinking first verifies that
    /// no id in the truncated range is alive.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityStillAlive`] when shrinking over a live id,
    /// [`EcsError::InvalidConfig`] when `new_capacity` exceeds the id space.
    pub fn resize(&mut self, new_capacity: usize) -> EcsResult<()> {
        let Ok(new_end) = u32::try_from(new_capacity) else {
            return Err(EcsError::InvalidConfig(format!(
                "entity capacity {new_capacity} exceeds u32::MAX"
            )));
        };
        let old_end = u32::try_from(self.capacity).unwrap_or(u32::MAX);

        if new_end > old_end {
            self.available.extend(old_end..new_end);
        } else if new_end < old_end {
            if let Some(entity) = (new_end..old_end)
                .find(|index| !self.available.contains(index))
                .map(Entity)
            {
                return Err(EcsError::EntityStillAlive {
                    entity,
                    new_capacity,
                });
            }
            // Everything at or beyond the new end is available, so split_off drops it.
            drop(self.available.split_off(&new_end));
        }

        self.capacity = new_capacity;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_smallest_first() {
        let mut allocator = EntityAllocator::new(3);

        assert_eq!(allocator.allocate().unwrap(), Entity::new(0));
        assert_eq!(allocator.allocate().unwrap(), Entity::new(1));
        assert_eq!(allocator.allocate().unwrap(), Entity::new(2));
        assert_eq!(
            allocator.allocate(),
            Err(EcsError::EntityCapacityExhausted { capacity: 3 })
        );
        assert_eq!(allocator.alive_count(), 3);
    }

    #[test]
    fn test_release_and_reuse() {
        let mut allocator = EntityAllocator::new(4);
        let e0 = allocator.allocate().unwrap();
        let e1 = allocator.allocate().unwrap();

        allocator.release(e0).unwrap();
        assert!(!allocator.is_alive(e0));
        assert!(allocator.is_alive(e1));

        // Should reuse the released id
        assert_eq!(allocator.allocate().unwrap(), e0);
    }

    #[test]
    fn test_double_release_fails() {
        let mut allocator = EntityAllocator::new(2);
        let e = allocator.allocate().unwrap();
        allocator.release(e).unwrap();

        assert_eq!(allocator.release(e), Err(EcsError::EntityNotAlive(e)));
        assert!(matches!(
            allocator.release(Entity::new(9)),
            Err(EcsError::EntityOutOfRange { .. })
        ));
    }

    #[test]
    fn test_resize_grow_and_shrink() {
        let mut allocator = EntityAllocator::new(2);
        let _ = allocator.allocate().unwrap();
        let e1 = allocator.allocate().unwrap();

        allocator.resize(4).unwrap();
        assert_eq!(allocator.available_count(), 2);
        assert_eq!(allocator.allocate().unwrap(), Entity::new(2));

        assert_eq!(
            allocator.resize(1),
            Err(EcsError::EntityStillAlive {
                entity: e1,
                new_capacity: 1
            })
        );

        allocator.release(Entity::new(2)).unwrap();
        allocator.resize(2).unwrap();
        assert_eq!(allocator.capacity(), 2);
        assert_eq!(allocator.available_count(), 0);
        assert_eq!(allocator.iter_alive().count(), 2);
    }
}
