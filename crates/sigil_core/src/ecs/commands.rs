//! # Commands
//!
//! Deferred structural mutation of the world.
//!
//! Systems that iterate a pool hold a borrow of the world and cannot create
//! or destroy entities in the same pass. They record the change in a
//! [`CommandBuffer`] instead; the buffer is applied after the pass, in
//! recording order.

use std::fmt;

use super::entity::Entity;
use super::pool::Component;
use super::world::World;
use crate::error::EcsResult;

/// A single recorded world mutation.
type Command = Box<dyn FnOnce(&mut World) -> EcsResult<()>>;

/// Ordered queue of deferred world mutations.
///
/// # Example
///
/// ```rust,ignore
/// let mut commands = CommandBuffer::new();
/// commands.destroy_entity(expired);
/// commands.create_entity_with(|world, entity| world.add_component(entity, Position::default()));
///
/// let applied = commands.apply(&mut world)?;
/// ```
#[derive(Default)]
pub struct CommandBuffer {
    queue: Vec<Command>,
}

impl CommandBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pending commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drops every pending command.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Records an arbitrary mutation.
    pub fn push<F>(&mut self, command: F)
    where
        F: FnOnce(&mut World) -> EcsResult<()> + 'static,
    {
        self.queue.push(Box::new(command));
    }

    /// Records the creation of an entity.
    pub fn create_entity(&mut self) {
        self.push(|world| {
            world.create_entity()?;
            Ok(())
        });
    }

    /// Records the creation of an entity followed by `init` on the new id.
    pub fn create_entity_with<F>(&mut self, init: F)
    where
        F: FnOnce(&mut World, Entity) -> EcsResult<()> + 'static,
    {
        self.push(move |world| {
            let entity = world.create_entity()?;
            init(world, entity)
        });
    }

    /// Records the destruction of `entity`.
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.push(move |world| world.destroy_entity(entity));
    }

    /// Records a strict [`World::add_component`].
    pub fn add_component<C: Component>(&mut self, entity: Entity, component: C) {
        self.push(move |world| world.add_component(entity, component));
    }

    /// Records an upserting [`World::insert_component`].
    pub fn insert_component<C: Component>(&mut self, entity: Entity, component: C) {
        self.push(move |world| world.insert_component(entity, component));
    }

    /// Records a [`World::remove_component`].
    pub fn remove_component<C: Component>(&mut self, entity: Entity) {
        self.push(move |world| world.remove_component::<C>(entity));
    }

    /// Applies every pending command in recording order and empties the
    /// buffer, returning how many commands were applied.
    ///
    /// # Errors
    ///
    /// Returns the first error a command produces. Commands after the
    /// failing one are dropped unapplied.
    pub fn apply(&mut self, world: &mut World) -> EcsResult<usize> {
        let queue = std::mem::take(&mut self.queue);
        let total = queue.len();

        for (applied, command) in queue.into_iter().enumerate() {
            if let Err(error) = command(world) {
                tracing::warn!(
                    applied,
                    dropped = total - applied - 1,
                    %error,
                    "command failed"
                );
                return Err(error);
            }
        }

        if total > 0 {
            tracing::trace!(applied = total, "commands applied");
        }
        Ok(total)
    }
}

impl fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("pending", &self.queue.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EcsError;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Health(u32);
    impl Component for Health {}

    fn world() -> World {
        let mut world = World::new(4, 2);
        world.register_component::<Health>().unwrap();
        world
    }

    #[test]
    fn test_commands_are_deferred() {
        let mut world = world();
        let mut commands = CommandBuffer::new();

        commands.create_entity();
        commands.create_entity_with(|world, entity| world.add_component(entity, Health(7)));
        assert_eq!(commands.len(), 2);
        assert_eq!(world.entity_count(), 0);

        assert_eq!(commands.apply(&mut world).unwrap(), 2);
        assert!(commands.is_empty());
        assert_eq!(world.entity_count(), 2);
        assert_eq!(*world.get_component::<Health>(Entity::new(1)).unwrap(), Health(7));
    }

    #[test]
    fn test_recording_order() {
        let mut world = world();
        let e = world.create_entity().unwrap();

        let mut commands = CommandBuffer::new();
        commands.add_component(e, Health(1));
        commands.insert_component(e, Health(2));
        commands.remove_component::<Health>(e);
        commands.insert_component(e, Health(3));
        commands.apply(&mut world).unwrap();

        assert_eq!(*world.get_component::<Health>(e).unwrap(), Health(3));
        assert!(world.contains_component::<Health>(e).unwrap());
    }

    #[test]
    fn test_first_failure_drops_the_rest() {
        let mut world = world();
        let e = world.create_entity().unwrap();

        let mut commands = CommandBuffer::new();
        commands.destroy_entity(e);
        commands.destroy_entity(e);
        commands.create_entity();

        assert_eq!(commands.apply(&mut world), Err(EcsError::EntityNotAlive(e)));
        assert!(commands.is_empty());
        assert_eq!(world.entity_count(), 0);
    }

    #[test]
    fn test_clear() {
        let mut world = world();
        let mut commands = CommandBuffer::new();
        commands.push(|world| {
            world.create_entity()?;
            Ok(())
        });
        commands.clear();

        assert_eq!(commands.apply(&mut world).unwrap(), 0);
        assert_eq!(world.entity_count(), 0);
    }
}
