//! Storage traits for gridstore.
//!
//! These traits define the contracts between the network and the things it
//! stores into:
//! - [`Inventory`]: anything that accepts inserts/extracts and can list itself
//! - [`SlotBackend`]: a third-party slot container with no change notification
//! - [`ItemRepository`]: a third-party container that reports whole totals
//! - [`StorageAccessor`]: a backend that hands out a native network inventory
//! - [`StorageTarget`]: whatever sits in front of a storage bus, probed for the
//!   capabilities above
//!
//! All methods take `&self`. Execution is single-threaded and reentrant, so
//! implementations keep their state in `Cell`/`RefCell` and must never hold a
//! borrow across a call back into the network.

use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

use crate::list::AggregatedList;
use crate::monitor::{NotifyContext, Observable};
use crate::settings::{AccessRestriction, Actionable};
use crate::source::ActionSource;
use crate::stack::{ChannelId, ResourceKey, ResourceStack};

/// A store of resources of one channel.
pub trait Inventory<K: ResourceKey> {
    /// Insert `input`. Returns the part that could not be placed, `None` when
    /// everything fit.
    fn insert(
        &self,
        input: ResourceStack<K>,
        mode: Actionable,
        src: &ActionSource,
        ctx: &mut NotifyContext,
    ) -> Option<ResourceStack<K>>;

    /// Extract up to `request`. Returns what was obtained, `None` when nothing
    /// matched.
    fn extract(
        &self,
        request: ResourceStack<K>,
        mode: Actionable,
        src: &ActionSource,
        ctx: &mut NotifyContext,
    ) -> Option<ResourceStack<K>>;

    /// Merge the current contents into `out`.
    fn available(&self, out: &mut AggregatedList<K>);

    fn access(&self) -> AccessRestriction {
        AccessRestriction::ReadWrite
    }

    fn channel(&self) -> ChannelId {
        K::CHANNEL
    }
}

/// A slot-addressed container without change notification.
///
/// Implementations may be non-conformant: returning more than requested from
/// `extract_at`, or silently ignoring an insert. Adapters cope with both.
pub trait SlotBackend<K: ResourceKey> {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &str {
        "slot backend"
    }

    fn slot_count(&self) -> usize;

    fn stack_in_slot(&self, slot: usize) -> Option<ResourceStack<K>>;

    /// Returns the remainder that did not fit into `slot`.
    fn insert_at(&self, slot: usize, stack: ResourceStack<K>, simulate: bool) -> Option<ResourceStack<K>>;

    /// Returns what was taken out of `slot`.
    fn extract_at(&self, slot: usize, amount: i64, simulate: bool) -> Option<ResourceStack<K>>;

    /// Whether anything can be taken out of `slot`.
    fn is_extractable(&self, slot: usize) -> bool {
        self.extract_at(slot, 1, true).is_some_and(|s| !s.is_empty())
    }
}

/// A container that reports aggregate totals instead of slots.
pub trait ItemRepository<K: ResourceKey> {
    fn name(&self) -> &str {
        "item repository"
    }

    /// Every stored resource with its total quantity.
    fn all_items(&self) -> Vec<ResourceStack<K>>;

    /// Returns the remainder that did not fit.
    fn insert(&self, stack: ResourceStack<K>, simulate: bool) -> Option<ResourceStack<K>>;

    /// Returns what was taken.
    fn extract(&self, key: &K, amount: i64, simulate: bool) -> Option<ResourceStack<K>>;
}

/// An inventory belonging to another network, optionally observable.
#[allow(missing_docs)]
#[derive(Clone)]
pub struct NativeStorage<K: ResourceKey> {
    pub inventory: Rc<dyn Inventory<K>>,
    pub observable: Option<Rc<dyn Observable<K>>>,
}

impl<K: ResourceKey> NativeStorage<K> {
    /// Exposes something that is both an inventory and observable, such as a
    /// `NetworkMonitor`.
    pub fn monitored<T>(monitor: Rc<T>) -> Self
    where
        T: Inventory<K> + Observable<K> + 'static,
    {
        Self {
            inventory: monitor.clone(),
            observable: Some(monitor),
        }
    }
}

impl<K: ResourceKey> fmt::Debug for NativeStorage<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeStorage")
            .field("observable", &self.observable.is_some())
            .finish_non_exhaustive()
    }
}

/// Backend capability that grants direct access to a network inventory.
pub trait StorageAccessor<K: ResourceKey> {
    /// The inventory visible to `src`, or `None` if `src` is not allowed in.
    fn inventory(&self, src: &ActionSource) -> Option<NativeStorage<K>>;
}

/// Stable identity of a backend instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendId(Uuid);

impl BackendId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for BackendId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whatever a storage bus is facing. Each capability is optional.
pub trait StorageTarget<K: ResourceKey> {
    fn backend_id(&self) -> BackendId;

    fn storage_accessor(&self) -> Option<Rc<dyn StorageAccessor<K>>> {
        None
    }

    fn item_repository(&self) -> Option<Rc<dyn ItemRepository<K>>> {
        None
    }

    fn slot_backend(&self) -> Option<Rc<dyn SlotBackend<K>>> {
        None
    }
}
