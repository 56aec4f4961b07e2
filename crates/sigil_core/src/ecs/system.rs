//! # Systems
//!
//! Registry of system instances and capability-keyed collections.
//!
//! ## Ownership
//!
//! [`Systems`] owns the [`World`]. A system never stores a world handle; it
//! receives a [`SystemContext`] borrowing the world and the pending command
//! buffer for the duration of one entry call.
//!
//! ## Capabilities
//!
//! A capability is a marker type. A system exposes a capability by
//! implementing [`Handles`] for it, and a [`SystemCollection`] groups the
//! registered systems exposing the same capability so they run as a batch.
//!
//! ```rust,ignore
//! #[derive(Default)]
//! struct Movement;
//!
//! impl System for Movement {}
//!
//! impl RunSystem for Movement {
//!     fn run(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
//!         let (mut positions, velocities) = ctx.world.pool_pair_mut::<Position, Velocity>()?;
//!         for (entity, position) in positions.iter_active_mut() {
//!             position.x += velocities.get_component(entity)?.dx;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut systems = Systems::new(world);
//! systems.create_system::<Movement>()?;
//! systems.create_collection::<Run>()?;
//! systems.add_system::<Run, Movement>()?;
//! systems.execute::<Run>()?;
//! ```

use std::any::{type_name, Any};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::marker::PhantomData;

use super::commands::CommandBuffer;
use super::types::{type_index, TypeIndex};
use super::world::World;
use crate::error::{EcsError, EcsResult};

/// A unit of logic registered with [`Systems`].
pub trait System: 'static {
    /// Human-readable name, used in logs and errors.
    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

/// Marker for a capability a system can expose.
pub trait Capability: 'static {}

/// Entry point of a system for capability `C`.
///
/// Implement it directly for user-defined capabilities. The built-in
/// capabilities are implemented through [`InitSystem`], [`RunSystem`] and
/// [`DestroySystem`].
pub trait Handles<C: Capability>: System {
    /// Runs the system once.
    ///
    /// # Errors
    ///
    /// Any error aborts the current execution pass.
    fn handle(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()>;
}

/// Built-in capability: one-time setup.
#[derive(Debug, Clone, Copy, Default)]
pub struct Init;

/// Built-in capability: per-step update.
#[derive(Debug, Clone, Copy, Default)]
pub struct Run;

/// Built-in capability: teardown.
#[derive(Debug, Clone, Copy, Default)]
pub struct Destroy;

impl Capability for Init {}
impl Capability for Run {}
impl Capability for Destroy {}

/// A system with a setup step.
pub trait InitSystem: System {
    /// Called by every [`Init`] collection the system belongs to.
    ///
    /// # Errors
    ///
    /// Any error aborts the current execution pass.
    fn init(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()>;
}

/// A system with a per-step update.
pub trait RunSystem: System {
    /// Called by every [`Run`] collection the system belongs to.
    ///
    /// # Errors
    ///
    /// Any error aborts the current execution pass.
    fn run(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()>;
}

/// A system with a teardown step.
pub trait DestroySystem: System {
    /// Called by every [`Destroy`] collection the system belongs to.
    ///
    /// # Errors
    ///
    /// Any error aborts the current execution pass.
    fn destroy(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()>;
}

impl<S: InitSystem> Handles<Init> for S {
    fn handle(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
        self.init(ctx)
    }
}

impl<S: RunSystem> Handles<Run> for S {
    fn handle(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
        self.run(ctx)
    }
}

impl<S: DestroySystem> Handles<Destroy> for S {
    fn handle(&mut self, ctx: &mut SystemContext<'_>) -> EcsResult<()> {
        self.destroy(ctx)
    }
}

/// Borrowed state handed to a system for one entry call.
///
/// Both fields are public so a system can iterate a pool of `world` while
/// recording structural changes into `commands`.
#[derive(Debug)]
pub struct SystemContext<'a> {
    /// The world, for direct component access.
    pub world: &'a mut World,
    /// Deferred mutations, applied once the whole collection has run.
    pub commands: &'a mut CommandBuffer,
}

impl<'a> SystemContext<'a> {
    /// Creates a context over `world` and `commands`.
    #[must_use]
    pub fn new(world: &'a mut World, commands: &'a mut CommandBuffer) -> Self {
        Self { world, commands }
    }
}

/// Monomorphized entry call: downcasts the stored system and runs it.
type Invoker = fn(&mut dyn Any, &mut SystemContext<'_>) -> EcsResult<()>;

fn invoke<C: Capability, S: Handles<C>>(
    system: &mut dyn Any,
    ctx: &mut SystemContext<'_>,
) -> EcsResult<()> {
    system
        .downcast_mut::<S>()
        .ok_or(EcsError::SystemNotFound(type_name::<S>()))?
        .handle(ctx)
}

/// A collection member.
#[derive(Clone, Copy)]
struct Member {
    system: TypeIndex,
    name: &'static str,
    invoke: Invoker,
}

/// Registered systems exposing capability `C`, executed as a batch.
///
/// Members are kept in insertion order, but callers must not rely on the
/// relative order of systems within one pass.
pub struct SystemCollection<C: Capability> {
    members: Vec<Member>,
    _capability: PhantomData<fn() -> C>,
}

impl<C: Capability> SystemCollection<C> {
    fn new() -> Self {
        Self {
            members: Vec::new(),
            _capability: PhantomData,
        }
    }

    /// Returns the number of members.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if the collection has no members.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Checks whether `S` is a member.
    #[must_use]
    pub fn contains<S: Handles<C>>(&self) -> bool {
        self.position(type_index::<S>()).is_some()
    }

    /// Iterates over member system names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.members.iter().map(|member| member.name)
    }

    fn position(&self, system: TypeIndex) -> Option<usize> {
        self.members.iter().position(|member| member.system == system)
    }

    fn insert<S: Handles<C>>(&mut self) -> EcsResult<()> {
        if self.contains::<S>() {
            return Err(EcsError::SystemAlreadyInCollection {
                system: type_name::<S>(),
                capability: type_name::<C>(),
            });
        }
        self.members.push(Member {
            system: type_index::<S>(),
            name: type_name::<S>(),
            invoke: invoke::<C, S>,
        });
        Ok(())
    }
}

impl<C: Capability> std::fmt::Debug for SystemCollection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemCollection")
            .field("capability", &type_name::<C>())
            .field("members", &self.members.iter().map(|m| m.name).collect::<Vec<_>>())
            .finish()
    }
}

/// Type-erased collection operations used by the registry.
trait AnyCollection {
    /// Drops `system` from the members, returning whether it was present.
    fn remove_member(&mut self, system: TypeIndex) -> bool;
    fn clear(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Capability> AnyCollection for SystemCollection<C> {
    fn remove_member(&mut self, system: TypeIndex) -> bool {
        match self.position(system) {
            Some(position) => {
                self.members.remove(position);
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        self.members.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A registered system instance.
struct SystemEntry {
    name: &'static str,
    system: Box<dyn Any>,
}

/// Owner of the world, the system instances and the capability collections.
pub struct Systems {
    world: World,
    systems: HashMap<TypeIndex, SystemEntry>,
    collections: HashMap<TypeIndex, Box<dyn AnyCollection>>,
    commands: CommandBuffer,
}

impl Systems {
    /// Takes ownership of `world`.
    #[must_use]
    pub fn new(world: World) -> Self {
        Self {
            world,
            systems: HashMap::new(),
            collections: HashMap::new(),
            commands: CommandBuffer::new(),
        }
    }

    /// Returns the world.
    #[inline]
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns the world mutably.
    #[inline]
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Drops every system and collection and returns the world.
    #[must_use]
    pub fn into_world(self) -> World {
        self.world
    }

    // =========================================================================
    // System instances
    // =========================================================================

    /// Instantiates `S` with its default value and registers it.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemAlreadyRegistered`].
    pub fn create_system<S: System + Default>(&mut self) -> EcsResult<&mut S> {
        self.insert_system(S::default())
    }

    /// Registers an already constructed system.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemAlreadyRegistered`].
    pub fn insert_system<S: System>(&mut self, system: S) -> EcsResult<&mut S> {
        let name = system.name();
        match self.systems.entry(type_index::<S>()) {
            Entry::Occupied(_) => Err(EcsError::SystemAlreadyRegistered(name)),
            Entry::Vacant(slot) => {
                tracing::debug!(system = name, "system registered");
                slot.insert(SystemEntry {
                    name,
                    system: Box::new(system),
                })
                .system
                .downcast_mut::<S>()
                .ok_or(EcsError::SystemNotFound(name))
            }
        }
    }

    /// Unregisters `S`, removes it from every collection and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`].
    pub fn destroy_system<S: System>(&mut self) -> EcsResult<S> {
        let index = type_index::<S>();
        let entry = self
            .systems
            .remove(&index)
            .ok_or(EcsError::SystemNotFound(type_name::<S>()))?;

        let mut memberships = 0_usize;
        for collection in self.collections.values_mut() {
            if collection.remove_member(index) {
                memberships += 1;
            }
        }
        tracing::debug!(system = entry.name, memberships, "system destroyed");

        entry
            .system
            .downcast::<S>()
            .map(|system| *system)
            .map_err(|_| EcsError::SystemNotFound(type_name::<S>()))
    }

    /// Checks whether `S` is registered.
    #[must_use]
    pub fn contains_system<S: System>(&self) -> bool {
        self.systems.contains_key(&type_index::<S>())
    }

    /// Returns the registered instance of `S`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`].
    pub fn system<S: System>(&self) -> EcsResult<&S> {
        self.systems
            .get(&type_index::<S>())
            .and_then(|entry| entry.system.downcast_ref::<S>())
            .ok_or(EcsError::SystemNotFound(type_name::<S>()))
    }

    /// Returns the registered instance of `S` mutably.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`].
    pub fn system_mut<S: System>(&mut self) -> EcsResult<&mut S> {
        self.systems
            .get_mut(&type_index::<S>())
            .and_then(|entry| entry.system.downcast_mut::<S>())
            .ok_or(EcsError::SystemNotFound(type_name::<S>()))
    }

    // =========================================================================
    // Collections
    // =========================================================================

    /// Creates the empty collection for capability `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CollectionAlreadyExists`].
    pub fn create_collection<C: Capability>(&mut self) -> EcsResult<()> {
        match self.collections.entry(type_index::<C>()) {
            Entry::Occupied(_) => Err(EcsError::CollectionAlreadyExists(type_name::<C>())),
            Entry::Vacant(slot) => {
                slot.insert(Box::new(SystemCollection::<C>::new()));
                tracing::debug!(capability = type_name::<C>(), "collection created");
                Ok(())
            }
        }
    }

    /// Drops the collection for capability `C`. Its members stay registered.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CollectionNotFound`].
    pub fn destroy_collection<C: Capability>(&mut self) -> EcsResult<()> {
        self.collections
            .remove(&type_index::<C>())
            .map(drop)
            .ok_or(EcsError::CollectionNotFound(type_name::<C>()))
    }

    /// Returns the collection for capability `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CollectionNotFound`].
    pub fn collection<C: Capability>(&self) -> EcsResult<&SystemCollection<C>> {
        self.collections
            .get(&type_index::<C>())
            .and_then(|collection| collection.as_any().downcast_ref::<SystemCollection<C>>())
            .ok_or(EcsError::CollectionNotFound(type_name::<C>()))
    }

    fn collection_mut<C: Capability>(&mut self) -> EcsResult<&mut SystemCollection<C>> {
        self.collections
            .get_mut(&type_index::<C>())
            .and_then(|collection| collection.as_any_mut().downcast_mut::<SystemCollection<C>>())
            .ok_or(EcsError::CollectionNotFound(type_name::<C>()))
    }

    /// Adds the registered system `S` to the collection for `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if `S` is not registered,
    /// [`EcsError::CollectionNotFound`] if the collection does not exist and
    /// [`EcsError::SystemAlreadyInCollection`] on a duplicate.
    pub fn add_system<C: Capability, S: Handles<C>>(&mut self) -> EcsResult<()> {
        if !self.contains_system::<S>() {
            return Err(EcsError::SystemNotFound(type_name::<S>()));
        }
        self.collection_mut::<C>()?.insert::<S>()
    }

    /// Removes `S` from the collection for `C`. `S` stays registered.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CollectionNotFound`] or
    /// [`EcsError::SystemNotInCollection`].
    pub fn remove_system<C: Capability, S: System>(&mut self) -> EcsResult<()> {
        if self.collection_mut::<C>()?.remove_member(type_index::<S>()) {
            Ok(())
        } else {
            Err(EcsError::SystemNotInCollection {
                system: type_name::<S>(),
                capability: type_name::<C>(),
            })
        }
    }

    /// Removes every member of the collection for `C`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CollectionNotFound`].
    pub fn clear_collection<C: Capability>(&mut self) -> EcsResult<()> {
        AnyCollection::clear(self.collection_mut::<C>()?);
        Ok(())
    }

    /// Invokes every member of the collection for `C` exactly once, on the
    /// calling thread, then applies the commands they recorded.
    ///
    /// Returns the number of systems invoked.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::CollectionNotFound`], or the first error raised by
    /// a member or by a recorded command. A failing member aborts the pass
    /// and its pending commands are discarded.
    pub fn execute<C: Capability>(&mut self) -> EcsResult<usize> {
        let Self {
            world,
            systems,
            collections,
            commands,
        } = self;

        let collection = collections
            .get(&type_index::<C>())
            .and_then(|collection| collection.as_any().downcast_ref::<SystemCollection<C>>())
            .ok_or(EcsError::CollectionNotFound(type_name::<C>()))?;

        for member in &collection.members {
            let entry = systems
                .get_mut(&member.system)
                .ok_or(EcsError::SystemNotFound(member.name))?;

            let mut ctx = SystemContext::new(world, commands);
            if let Err(error) = (member.invoke)(entry.system.as_mut(), &mut ctx) {
                tracing::warn!(
                    capability = type_name::<C>(),
                    system = member.name,
                    discarded = commands.len(),
                    %error,
                    "system failed, execution pass aborted"
                );
                commands.clear();
                return Err(error);
            }
        }

        commands.apply(world)?;
        tracing::trace!(
            capability = type_name::<C>(),
            systems = collection.len(),
            "collection executed"
        );
        Ok(collection.len())
    }
}

impl Default for Systems {
    fn default() -> Self {
        Self::new(World::default())
    }
}

impl std::fmt::Debug for Systems {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Systems")
            .field("systems", &self.systems.len())
            .field("collections", &self.collections.len())
            .field("pending_commands", &self.commands.len())
            .finish_non_exhaustive()
    }
}
