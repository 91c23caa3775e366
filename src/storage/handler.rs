//! Inventory handlers: access, priority and partition rules around a backend.

use std::collections::BTreeSet;
use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

use crate::list::AggregatedList;
use crate::monitor::{ListenerToken, NotifyContext};
use crate::settings::{AccessRestriction, Actionable, FuzzyMode, IncludeExclude};
use crate::source::ActionSource;
use crate::stack::{ResourceKey, ResourceStack};

use super::traits::Inventory;

/// Unique identity of one handler instance.
///
/// A rebuilt handler always gets a fresh id, which is how listeners registered
/// for a stale handler are recognised and pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

impl HandlerId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Listener verification token bound to this handler.
    #[must_use]
    pub const fn token(self) -> ListenerToken {
        ListenerToken::from_uuid(self.0)
    }
}

impl Default for HandlerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resources a handler lists as allowed or denied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionList<K: ResourceKey> {
    /// Exact identity match.
    Precise(BTreeSet<K>),
    /// Fuzzy match under a wear tolerance.
    Fuzzy { keys: Vec<K>, mode: FuzzyMode },
}

impl<K: ResourceKey> PartitionList<K> {
    /// An empty precise list.
    #[must_use]
    pub fn empty() -> Self {
        Self::Precise(BTreeSet::new())
    }

    #[must_use]
    pub fn is_listed(&self, key: &K) -> bool {
        match self {
            Self::Precise(keys) => keys.contains(key),
            Self::Fuzzy { keys, mode } => keys.iter().any(|k| k.fuzzy_matches(key, *mode)),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Precise(keys) => keys.is_empty(),
            Self::Fuzzy { keys, .. } => keys.is_empty(),
        }
    }
}

impl<K: ResourceKey> Default for PartitionList<K> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Wraps one backend inventory and applies access, priority and partition rules.
///
/// Handlers are immutable once built; configuration changes produce a new
/// handler with a new [`HandlerId`].
pub struct InventoryHandler<K: ResourceKey> {
    id: HandlerId,
    inner: Rc<dyn Inventory<K>>,
    access: AccessRestriction,
    priority: i32,
    partition: PartitionList<K>,
    mode: IncludeExclude,
}

impl<K: ResourceKey> InventoryHandler<K> {
    /// Creates a handler with full access, priority 0 and no partition.
    #[must_use]
    pub fn new(inner: Rc<dyn Inventory<K>>) -> Self {
        Self {
            id: HandlerId::new(),
            inner,
            access: AccessRestriction::ReadWrite,
            priority: 0,
            partition: PartitionList::empty(),
            mode: IncludeExclude::Whitelist,
        }
    }

    #[must_use]
    pub fn with_access(mut self, access: AccessRestriction) -> Self {
        self.access = access;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_partition(mut self, partition: PartitionList<K>, mode: IncludeExclude) -> Self {
        self.partition = partition;
        self.mode = mode;
        self
    }

    #[must_use]
    pub const fn id(&self) -> HandlerId {
        self.id
    }

    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub const fn partition(&self) -> &PartitionList<K> {
        &self.partition
    }

    #[must_use]
    pub const fn include_exclude(&self) -> IncludeExclude {
        self.mode
    }

    /// The wrapped backend inventory.
    #[must_use]
    pub fn inner(&self) -> &Rc<dyn Inventory<K>> {
        &self.inner
    }

    /// Whether the partition rules and write access allow `key` in.
    #[must_use]
    pub fn can_accept(&self, key: &K) -> bool {
        if !self.access().can_write() {
            return false;
        }
        match self.mode {
            IncludeExclude::Blacklist => !self.partition.is_listed(key),
            IncludeExclude::Whitelist => self.partition.is_empty() || self.partition.is_listed(key),
        }
    }

    /// True when `key` is explicitly whitelisted, so it should be offered to
    /// this handler before any unpartitioned one.
    #[must_use]
    pub fn is_prioritized(&self, key: &K) -> bool {
        self.mode == IncludeExclude::Whitelist && self.partition.is_listed(key)
    }
}

impl<K: ResourceKey> Inventory<K> for InventoryHandler<K> {
    fn insert(
        &self,
        input: ResourceStack<K>,
        mode: Actionable,
        src: &ActionSource,
        ctx: &mut NotifyContext,
    ) -> Option<ResourceStack<K>> {
        if input.amount() <= 0 {
            return Some(input);
        }
        if !self.can_accept(input.key()) {
            return Some(input);
        }
        self.inner.insert(input, mode, src, ctx)
    }

    fn extract(
        &self,
        request: ResourceStack<K>,
        mode: Actionable,
        src: &ActionSource,
        ctx: &mut NotifyContext,
    ) -> Option<ResourceStack<K>> {
        if !self.access().can_read() || request.amount() <= 0 {
            return None;
        }
        self.inner.extract(request, mode, src, ctx)
    }

    fn available(&self, out: &mut AggregatedList<K>) {
        if self.access().can_read() {
            self.inner.available(out);
        }
    }

    fn access(&self) -> AccessRestriction {
        self.access.restrict(self.inner.access())
    }
}

impl<K: ResourceKey> fmt::Debug for InventoryHandler<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InventoryHandler")
            .field("id", &self.id)
            .field("access", &self.access)
            .field("priority", &self.priority)
            .field("partition", &self.partition)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
