//! Ordered adapter strategies and backend fingerprints.
//!
//! A storage bus does not inspect backend types. It walks a [`StrategyChain`]:
//! each strategy checks one capability of the [`StorageTarget`] and either
//! skips, refuses, or binds an inventory. The first binding wins.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::monitor::Observable;
use crate::settings::StorageFilter;
use crate::source::ActionSource;
use crate::stack::ResourceKey;
use crate::storage::{BackendId, Inventory, StorageTarget};

use super::cache::{TickAlert, TickingMonitor};
use super::repository::RepositoryAdapter;
use super::slots::ExternalInventoryAdapter;

/// Cheap structural signature of a reachable backend.
///
/// Computed from the backend identity, the strategy that would bind it and a
/// strategy-specific shape value such as the slot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(u64);

impl Fingerprint {
    #[must_use]
    pub fn compute(backend: BackendId, strategy: &str, signature: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(backend.as_bytes());
        hasher.update(strategy.as_bytes());
        hasher.update(&signature.to_le_bytes());
        let digest = hasher.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        Self(u64::from_le_bytes(head))
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// What a strategy needs to build an adapter.
#[allow(missing_docs)]
#[derive(Clone)]
pub struct BindContext {
    pub source: ActionSource,
    pub filter: StorageFilter,
    pub alert: Option<Weak<dyn TickAlert>>,
}

impl fmt::Debug for BindContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindContext")
            .field("source", &self.source)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// A bound backend.
#[allow(missing_docs)]
pub struct Binding<K: ResourceKey> {
    pub inventory: Rc<dyn Inventory<K>>,
    /// Present when the backend has to be polled.
    pub ticking: Option<Rc<dyn TickingMonitor<K>>>,
    /// Present when changes can be subscribed to.
    pub observable: Option<Rc<dyn Observable<K>>>,
    pub strategy: &'static str,
}

impl<K: ResourceKey> fmt::Debug for Binding<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("strategy", &self.strategy)
            .field("ticking", &self.ticking.is_some())
            .field("observable", &self.observable.is_some())
            .finish_non_exhaustive()
    }
}

/// Outcome of one strategy probe.
#[derive(Debug)]
pub enum Probe<K: ResourceKey> {
    /// Capability absent; try the next strategy.
    Skip,
    /// Capability present but it turned us away; stop probing.
    Refused,
    Bound(Binding<K>),
}

/// One way of adapting a backend.
pub trait AdapterStrategy<K: ResourceKey> {
    fn name(&self) -> &'static str;

    /// Shape value for the fingerprint, `None` when the capability is absent.
    fn signature(&self, target: &dyn StorageTarget<K>) -> Option<u64>;

    fn bind(&self, target: &dyn StorageTarget<K>, cx: &BindContext) -> Probe<K>;
}

/// Binds a backend that hands out a network inventory directly.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeStrategy;

impl<K: ResourceKey> AdapterStrategy<K> for NativeStrategy {
    fn name(&self) -> &'static str {
        "native"
    }

    fn signature(&self, target: &dyn StorageTarget<K>) -> Option<u64> {
        target.storage_accessor().map(|_| 0)
    }

    fn bind(&self, target: &dyn StorageTarget<K>, cx: &BindContext) -> Probe<K> {
        let Some(accessor) = target.storage_accessor() else {
            return Probe::Skip;
        };
        match accessor.inventory(&cx.source) {
            Some(native) => Probe::Bound(Binding {
                inventory: native.inventory,
                ticking: None,
                observable: native.observable,
                strategy: "native",
            }),
            None => Probe::Refused,
        }
    }
}

/// Binds an item repository through a [`RepositoryAdapter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RepositoryStrategy;

impl<K: ResourceKey> AdapterStrategy<K> for RepositoryStrategy {
    fn name(&self) -> &'static str {
        "repository"
    }

    fn signature(&self, target: &dyn StorageTarget<K>) -> Option<u64> {
        // Distinct entry count, so a partial reset rebinds once the set of
        // stored identities has grown or shrunk.
        target.item_repository().map(|repo| repo.all_items().len() as u64)
    }

    fn bind(&self, target: &dyn StorageTarget<K>, cx: &BindContext) -> Probe<K> {
        let Some(repo) = target.item_repository() else {
            return Probe::Skip;
        };
        let adapter = Rc::new(RepositoryAdapter::new(repo).with_alert(cx.alert.clone()));
        Probe::Bound(Binding {
            inventory: adapter.clone(),
            ticking: Some(adapter.clone()),
            observable: Some(adapter),
            strategy: "repository",
        })
    }
}

/// Binds a slot container through an [`ExternalInventoryAdapter`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SlotStrategy;

impl<K: ResourceKey> AdapterStrategy<K> for SlotStrategy {
    fn name(&self) -> &'static str {
        "slots"
    }

    fn signature(&self, target: &dyn StorageTarget<K>) -> Option<u64> {
        target.slot_backend().map(|slots| slots.slot_count() as u64)
    }

    fn bind(&self, target: &dyn StorageTarget<K>, cx: &BindContext) -> Probe<K> {
        let Some(slots) = target.slot_backend() else {
            return Probe::Skip;
        };
        let adapter = Rc::new(ExternalInventoryAdapter::new(slots, cx.filter).with_alert(cx.alert.clone()));
        Probe::Bound(Binding {
            inventory: adapter.clone(),
            ticking: Some(adapter.clone()),
            observable: Some(adapter),
            strategy: "slots",
        })
    }
}

/// Strategies in probing order.
pub struct StrategyChain<K: ResourceKey> {
    strategies: Vec<Box<dyn AdapterStrategy<K>>>,
}

impl<K: ResourceKey> StrategyChain<K> {
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn AdapterStrategy<K>>>) -> Self {
        Self { strategies }
    }

    /// Native storage first, then item repositories, then plain slots.
    #[must_use]
    pub fn default_chain() -> Self {
        Self::new(vec![
            Box::new(NativeStrategy),
            Box::new(RepositoryStrategy),
            Box::new(SlotStrategy),
        ])
    }

    /// Fingerprint of `target` under the first strategy that recognises it.
    #[must_use]
    pub fn fingerprint(&self, target: &dyn StorageTarget<K>) -> Option<Fingerprint> {
        self.strategies.iter().find_map(|s| {
            s.signature(target)
                .map(|sig| Fingerprint::compute(target.backend_id(), s.name(), sig))
        })
    }

    /// Binds `target` with the first matching strategy.
    pub fn bind(&self, target: &dyn StorageTarget<K>, cx: &BindContext) -> Option<Binding<K>> {
        for strategy in &self.strategies {
            match strategy.bind(target, cx) {
                Probe::Skip => continue,
                Probe::Refused => {
                    tracing::debug!(strategy = strategy.name(), backend = %target.backend_id(), "backend refused access");
                    return None;
                }
                Probe::Bound(binding) => return Some(binding),
            }
        }
        None
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl<K: ResourceKey> Default for StrategyChain<K> {
    fn default() -> Self {
        Self::default_chain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::ItemKey;
    use crate::storage::{ItemRepository, MemoryRepository, NativeStorage, SlotBackend, SlotInventory, StorageAccessor};

    struct Target {
        id: BackendId,
        slots: Option<Rc<SlotInventory<ItemKey>>>,
        repo: Option<Rc<MemoryRepository<ItemKey>>>,
        accessor: Option<Rc<dyn StorageAccessor<ItemKey>>>,
    }

    impl Target {
        fn new() -> Self {
            Self {
                id: BackendId::new(),
                slots: None,
                repo: None,
                accessor: None,
            }
        }
    }

    impl StorageTarget<ItemKey> for Target {
        fn backend_id(&self) -> BackendId {
            self.id
        }

        fn storage_accessor(&self) -> Option<Rc<dyn StorageAccessor<ItemKey>>> {
            self.accessor.clone()
        }

        fn item_repository(&self) -> Option<Rc<dyn ItemRepository<ItemKey>>> {
            self.repo.clone().map(|r| r as Rc<dyn ItemRepository<ItemKey>>)
        }

        fn slot_backend(&self) -> Option<Rc<dyn SlotBackend<ItemKey>>> {
            self.slots.clone().map(|s| s as Rc<dyn SlotBackend<ItemKey>>)
        }
    }

    struct Gatekeeper;

    impl StorageAccessor<ItemKey> for Gatekeeper {
        fn inventory(&self, _src: &ActionSource) -> Option<NativeStorage<ItemKey>> {
            None
        }
    }

    fn cx() -> BindContext {
        BindContext {
            source: ActionSource::Anonymous,
            filter: StorageFilter::AllItems,
            alert: None,
        }
    }

    #[test]
    fn repository_is_preferred_over_slots() {
        let mut target = Target::new();
        target.slots = Some(Rc::new(SlotInventory::<ItemKey>::new(9, 64)));
        target.repo = Some(Rc::new(MemoryRepository::<ItemKey>::new()));

        let chain = StrategyChain::<ItemKey>::default_chain();
        let binding = chain.bind(&target, &cx()).map(|b| b.strategy);
        assert_eq!(binding, Some("repository"));
    }

    #[test]
    fn refusing_accessor_stops_probing() {
        let mut target = Target::new();
        target.slots = Some(Rc::new(SlotInventory::<ItemKey>::new(9, 64)));
        target.accessor = Some(Rc::new(Gatekeeper));

        let chain = StrategyChain::<ItemKey>::default_chain();
        assert!(chain.bind(&target, &cx()).is_none());
    }

    #[test]
    fn fingerprint_tracks_shape_and_identity() {
        let mut target = Target::new();
        let chain = StrategyChain::<ItemKey>::default_chain();
        assert!(chain.fingerprint(&target).is_none());

        target.slots = Some(Rc::new(SlotInventory::<ItemKey>::new(9, 64)));
        let nine = chain.fingerprint(&target);
        assert_eq!(nine, chain.fingerprint(&target));

        target.slots = Some(Rc::new(SlotInventory::<ItemKey>::new(27, 64)));
        assert_ne!(nine, chain.fingerprint(&target));

        let mut other = Target::new();
        other.slots = Some(Rc::new(SlotInventory::<ItemKey>::new(27, 64)));
        assert_ne!(chain.fingerprint(&other), chain.fingerprint(&target));
    }

    #[test]
    fn repository_fingerprint_follows_distinct_entries() {
        let repo = Rc::new(MemoryRepository::<ItemKey>::new());
        repo.put(crate::stack::ResourceStack::new(ItemKey::new("stone"), 10));
        let mut target = Target::new();
        target.repo = Some(repo.clone());
        let chain = StrategyChain::<ItemKey>::default_chain();

        let one = chain.fingerprint(&target);
        assert!(one.is_some());

        // Amounts alone leave the shape alone.
        repo.put(crate::stack::ResourceStack::new(ItemKey::new("stone"), 30));
        assert_eq!(one, chain.fingerprint(&target));

        repo.put(crate::stack::ResourceStack::new(ItemKey::new("glass"), 1));
        let two = chain.fingerprint(&target);
        assert_ne!(one, two);

        target.slots = Some(Rc::new(SlotInventory::<ItemKey>::new(2, 64)));
        assert_eq!(two, chain.fingerprint(&target));
    }
}
