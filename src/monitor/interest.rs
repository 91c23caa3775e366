//! Per-identity watcher registry consulted during announcements.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use crate::stack::{ChannelId, ResourceKey, ResourceStack};

use super::context::NotifyContext;

/// Something watching one resource identity (a level emitter, a terminal
/// counter, ...).
pub trait StackWatcherHost<K: ResourceKey> {
    fn on_stack_change(&self, change: &ResourceStack<K>, channel: ChannelId, ctx: &mut NotifyContext);
}

/// Maps resource identities to watchers.
///
/// A monitor brackets every announcement with `begin_batch`/`end_batch` so the
/// registry can hold back its own side effects until the pass is over.
pub trait InterestRegistry<K: ResourceKey> {
    fn watchers(&self, key: &K) -> Vec<Rc<dyn StackWatcherHost<K>>>;

    fn begin_batch(&self);

    fn end_batch(&self);
}

enum PendingOp<K: ResourceKey> {
    Watch(K, Weak<dyn StackWatcherHost<K>>),
    Unwatch(K, Weak<dyn StackWatcherHost<K>>),
}

/// Default [`InterestRegistry`].
///
/// Watch/unwatch requests made while a batch is open are queued and applied
/// when the outermost batch closes.
pub struct InterestManager<K: ResourceKey> {
    watchers: RefCell<BTreeMap<K, Vec<Weak<dyn StackWatcherHost<K>>>>>,
    batch_depth: Cell<u32>,
    pending: RefCell<Vec<PendingOp<K>>>,
}

impl<K: ResourceKey> Default for InterestManager<K> {
    fn default() -> Self {
        Self {
            watchers: RefCell::new(BTreeMap::new()),
            batch_depth: Cell::new(0),
            pending: RefCell::new(Vec::new()),
        }
    }
}

impl<K: ResourceKey> InterestManager<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(&self, key: K, host: &Rc<dyn StackWatcherHost<K>>) {
        self.apply_or_queue(PendingOp::Watch(key, Rc::downgrade(host)));
    }

    pub fn unwatch(&self, key: K, host: &Rc<dyn StackWatcherHost<K>>) {
        self.apply_or_queue(PendingOp::Unwatch(key, Rc::downgrade(host)));
    }

    /// Number of identities with at least one live registration.
    #[must_use]
    pub fn watched_keys(&self) -> usize {
        self.prune();
        self.watchers.borrow().len()
    }

    #[must_use]
    pub fn in_batch(&self) -> bool {
        self.batch_depth.get() > 0
    }

    fn apply_or_queue(&self, op: PendingOp<K>) {
        if self.in_batch() {
            self.pending.borrow_mut().push(op);
        } else {
            self.apply(op);
        }
    }

    /// Drops registrations whose watcher is gone, and identities left empty.
    fn prune(&self) {
        self.watchers.borrow_mut().retain(|_, hosts| {
            hosts.retain(|h| h.strong_count() > 0);
            !hosts.is_empty()
        });
    }

    fn apply(&self, op: PendingOp<K>) {
        let mut watchers = self.watchers.borrow_mut();
        match op {
            PendingOp::Watch(key, host) => {
                let hosts = watchers.entry(key).or_default();
                if !hosts.iter().any(|h| std::ptr::addr_eq(h.as_ptr(), host.as_ptr())) {
                    hosts.push(host);
                }
            }
            PendingOp::Unwatch(key, host) => {
                if let Some(hosts) = watchers.get_mut(&key) {
                    hosts.retain(|h| !std::ptr::addr_eq(h.as_ptr(), host.as_ptr()));
                    if hosts.is_empty() {
                        watchers.remove(&key);
                    }
                }
            }
        }
    }
}

impl<K: ResourceKey> InterestRegistry<K> for InterestManager<K> {
    fn watchers(&self, key: &K) -> Vec<Rc<dyn StackWatcherHost<K>>> {
        let mut watchers = self.watchers.borrow_mut();
        let Some(hosts) = watchers.get_mut(key) else {
            return Vec::new();
        };
        let live: Vec<_> = hosts.iter().filter_map(Weak::upgrade).collect();
        if live.len() != hosts.len() {
            hosts.retain(|h| h.strong_count() > 0);
            if hosts.is_empty() {
                watchers.remove(key);
            }
        }
        live
    }

    fn begin_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    fn end_batch(&self) {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        if depth == 0 {
            let queued = std::mem::take(&mut *self.pending.borrow_mut());
            for op in queued {
                self.apply(op);
            }
            self.prune();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::ItemKey;

    struct Watcher {
        seen: Cell<i64>,
    }

    impl StackWatcherHost<ItemKey> for Watcher {
        fn on_stack_change(&self, change: &ResourceStack<ItemKey>, _channel: ChannelId, _ctx: &mut NotifyContext) {
            self.seen.set(self.seen.get() + change.amount());
        }
    }

    #[test]
    fn registration_during_batch_is_deferred() {
        let manager = InterestManager::new();
        let host: Rc<dyn StackWatcherHost<ItemKey>> = Rc::new(Watcher { seen: Cell::new(0) });
        let stone = ItemKey::new("stone");

        manager.begin_batch();
        manager.watch(stone.clone(), &host);
        assert!(manager.watchers(&stone).is_empty());
        manager.end_batch();
        assert_eq!(manager.watchers(&stone).len(), 1);

        manager.unwatch(stone.clone(), &host);
        assert_eq!(manager.watched_keys(), 0);
    }

    #[test]
    fn duplicate_watch_is_ignored() {
        let manager = InterestManager::new();
        let host: Rc<dyn StackWatcherHost<ItemKey>> = Rc::new(Watcher { seen: Cell::new(0) });
        manager.watch(ItemKey::new("stone"), &host);
        manager.watch(ItemKey::new("stone"), &host);
        assert_eq!(manager.watchers(&ItemKey::new("stone")).len(), 1);
    }

    #[test]
    fn dropped_watchers_are_forgotten() {
        let manager = InterestManager::new();
        let hosts: Vec<Rc<dyn StackWatcherHost<ItemKey>>> = (0..100)
            .map(|_| Rc::new(Watcher { seen: Cell::new(0) }) as Rc<dyn StackWatcherHost<ItemKey>>)
            .collect();
        for (i, host) in hosts.iter().enumerate() {
            manager.watch(ItemKey::new(format!("item_{i}")), host);
        }
        assert_eq!(manager.watched_keys(), 100);

        let kept = hosts[7].clone();
        drop(hosts);
        assert_eq!(manager.watched_keys(), 1);
        assert!(manager.watchers(&ItemKey::new("item_3")).is_empty());
        assert_eq!(manager.watchers(&ItemKey::new("item_7")).len(), 1);

        drop(kept);
        assert!(manager.watchers(&ItemKey::new("item_7")).is_empty());
        manager.begin_batch();
        manager.end_batch();
        assert_eq!(manager.watched_keys(), 0);
    }
}
