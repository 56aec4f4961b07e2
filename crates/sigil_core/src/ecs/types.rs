//! # Type Registry
//!
//! Assigns every distinct Rust type a dense, process-wide [`TypeIndex`].
//!
//! ## Allocation Rule
//!
//! - The first lookup of a type takes the next value of a single atomic
//!   counter and caches it
//! - Every later lookup of the same type returns the cached value
//! - Indices start at 0, follow first-use order and are never reused or
//!   reset for the lifetime of the process
//!
//! The cache is guarded by a read/write lock. A miss re-checks the map under
//! the write lock, so two threads racing on the first use of the same type
//! still mint exactly one index.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use parking_lot::RwLock;

/// Dense runtime identifier of a component, system or capability type.
pub type TypeIndex = u32;

/// Next index to hand out.
static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Cached indices plus the type name recorded at mint time.
struct RegistryTable {
    by_type: HashMap<TypeId, TypeIndex>,
    names: Vec<&'static str>,
}

static TABLE: OnceLock<RwLock<RegistryTable>> = OnceLock::new();

fn table() -> &'static RwLock<RegistryTable> {
    TABLE.get_or_init(|| {
        RwLock::new(RegistryTable {
            by_type: HashMap::new(),
            names: Vec::new(),
        })
    })
}

/// Process-wide type registry.
///
/// Stateless handle; all state is global. Use [`type_index`] as shorthand.
pub struct TypeRegistry;

impl TypeRegistry {
    /// Returns the index of `T`, minting one on first use.
    #[must_use]
    pub fn index_of<T: ?Sized + 'static>() -> TypeIndex {
        let id = TypeId::of::<T>();

        if let Some(&index) = table().read().by_type.get(&id) {
            return index;
        }

        let mut table = table().write();
        if let Some(&index) = table.by_type.get(&id) {
            return index;
        }

        let index = COUNTER.fetch_add(1, Ordering::Relaxed);
        table.by_type.insert(id, index);
        // Minting happens under the write lock, so names stay in index order.
        table.names.push(type_name::<T>());
        tracing::trace!(index, name = type_name::<T>(), "minted type index");
        index
    }

    /// Returns how many indices have been minted so far.
    #[must_use]
    pub fn allocated() -> u32 {
        COUNTER.load(Ordering::Relaxed)
    }

    /// Returns the type name recorded for `index`, if it was minted.
    #[must_use]
    pub fn name_of(index: TypeIndex) -> Option<&'static str> {
        let position = usize::try_from(index).ok()?;
        table().read().names.get(position).copied()
    }
}

/// Returns the dense index of `T`.
///
/// Shorthand for [`TypeRegistry::index_of`].
#[inline]
#[must_use]
pub fn type_index<T: ?Sized + 'static>() -> TypeIndex {
    TypeRegistry::index_of::<T>()
}
