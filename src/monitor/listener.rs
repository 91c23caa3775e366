//! Monitor listeners and their lazily pruned registry.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use uuid::Uuid;

use crate::source::ActionSource;
use crate::stack::{ResourceKey, ResourceStack};

use super::context::NotifyContext;
use super::network::MonitorId;

/// Opaque verification token handed over at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerToken(Uuid);

impl ListenerToken {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ListenerToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Receives net deltas from a monitor.
pub trait MonitorListener<K: ResourceKey> {
    /// Whether the registration made with `token` is still wanted.
    fn is_valid(&self, token: &ListenerToken) -> bool;

    /// A listener without interest is dropped on the next pass.
    fn has_interest(&self) -> bool {
        true
    }

    /// One net delta from `origin`. The listener may mutate any network from
    /// here, passing `ctx` along.
    fn post_change(
        &self,
        origin: MonitorId,
        changes: &[ResourceStack<K>],
        src: &ActionSource,
        ctx: &mut NotifyContext,
    );

    /// The monitored list was rebuilt from scratch.
    fn on_list_update(&self) {}
}

/// Something listeners can subscribe to.
pub trait Observable<K: ResourceKey> {
    /// Registers `listener`, replacing any earlier registration of it.
    fn add_listener(&self, listener: &Rc<dyn MonitorListener<K>>, token: ListenerToken);

    fn remove_listener(&self, listener: &Rc<dyn MonitorListener<K>>);
}

type Entry<K> = (Weak<dyn MonitorListener<K>>, ListenerToken);

/// Listener registrations, held weakly and pruned while iterating.
pub struct ListenerRegistry<K: ResourceKey> {
    entries: RefCell<Vec<Entry<K>>>,
}

impl<K: ResourceKey> Default for ListenerRegistry<K> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<K: ResourceKey> ListenerRegistry<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: &Rc<dyn MonitorListener<K>>, token: ListenerToken) {
        let weak = Rc::downgrade(listener);
        let mut entries = self.entries.borrow_mut();
        match entries.iter_mut().find(|(w, _)| same(w, &weak)) {
            Some(entry) => entry.1 = token,
            None => entries.push((weak, token)),
        }
    }

    pub fn remove(&self, listener: &Rc<dyn MonitorListener<K>>) {
        let weak = Rc::downgrade(listener);
        self.entries.borrow_mut().retain(|(w, _)| !same(w, &weak));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Calls `f` for every live, valid and interested listener.
    ///
    /// Dead registrations found on the way are removed afterwards. The
    /// registry is not borrowed while `f` runs, so callbacks may add or remove
    /// listeners freely.
    pub fn for_each(&self, f: impl FnMut(&dyn MonitorListener<K>)) {
        self.visit(true, f);
    }

    /// Like [`for_each`](Self::for_each) but ignores interest, so listeners
    /// that want no deltas still see list rebuilds and stay registered.
    pub fn for_each_valid(&self, f: impl FnMut(&dyn MonitorListener<K>)) {
        self.visit(false, f);
    }

    fn visit(&self, interested_only: bool, mut f: impl FnMut(&dyn MonitorListener<K>)) {
        let snapshot: Vec<Entry<K>> = self.entries.borrow().clone();
        let mut dead = Vec::new();

        for (weak, token) in snapshot {
            let alive = weak
                .upgrade()
                .filter(|l| l.is_valid(&token) && (!interested_only || l.has_interest()));
            match alive {
                Some(listener) => f(listener.as_ref()),
                None => dead.push((weak, token)),
            }
        }

        if !dead.is_empty() {
            self.entries
                .borrow_mut()
                .retain(|(w, t)| !dead.iter().any(|(dw, dt)| dt == t && same(dw, w)));
        }
    }
}

fn same<K: ResourceKey>(a: &Weak<dyn MonitorListener<K>>, b: &Weak<dyn MonitorListener<K>>) -> bool {
    std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
}

impl<K: ResourceKey> fmt::Debug for ListenerRegistry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::stack::ItemKey;

    #[derive(Default)]
    struct Counter {
        calls: Cell<usize>,
        updates: Cell<usize>,
        valid: Cell<bool>,
        bored: Cell<bool>,
    }

    impl MonitorListener<ItemKey> for Counter {
        fn is_valid(&self, _token: &ListenerToken) -> bool {
            self.valid.get()
        }

        fn has_interest(&self) -> bool {
            !self.bored.get()
        }

        fn on_list_update(&self) {
            self.updates.set(self.updates.get() + 1);
        }

        fn post_change(
            &self,
            _origin: MonitorId,
            _changes: &[ResourceStack<ItemKey>],
            _src: &ActionSource,
            _ctx: &mut NotifyContext,
        ) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    fn counter() -> Rc<Counter> {
        let c = Rc::new(Counter::default());
        c.valid.set(true);
        c
    }

    #[test]
    fn duplicate_registration_overwrites() {
        let registry = ListenerRegistry::new();
        let c = counter();
        let dyn_c: Rc<dyn MonitorListener<ItemKey>> = c.clone();
        registry.add(&dyn_c, ListenerToken::new());
        registry.add(&dyn_c, ListenerToken::new());
        assert_eq!(registry.len(), 1);

        registry.for_each(|_| {});
        registry.remove(&dyn_c);
        assert!(registry.is_empty());
    }

    #[test]
    fn invalid_and_dropped_listeners_are_pruned() {
        let registry = ListenerRegistry::new();
        let keep = counter();
        let invalid = counter();
        let keep_dyn: Rc<dyn MonitorListener<ItemKey>> = keep.clone();
        let invalid_dyn: Rc<dyn MonitorListener<ItemKey>> = invalid.clone();
        registry.add(&keep_dyn, ListenerToken::new());
        registry.add(&invalid_dyn, ListenerToken::new());
        {
            let dropped: Rc<dyn MonitorListener<ItemKey>> = counter();
            registry.add(&dropped, ListenerToken::new());
        }
        assert_eq!(registry.len(), 3);

        invalid.valid.set(false);
        let mut ctx = NotifyContext::new();
        registry.for_each(|l| l.post_change(MonitorId::new(), &[], &ActionSource::Anonymous, &mut ctx));

        assert_eq!(registry.len(), 1);
        assert_eq!(keep.calls.get(), 1);
        assert_eq!(invalid.calls.get(), 0);
    }

    #[test]
    fn list_rebuild_reaches_uninterested_listeners() {
        let registry = ListenerRegistry::new();
        let bored = counter();
        bored.bored.set(true);
        let invalid = counter();
        invalid.valid.set(false);
        let bored_dyn: Rc<dyn MonitorListener<ItemKey>> = bored.clone();
        let invalid_dyn: Rc<dyn MonitorListener<ItemKey>> = invalid.clone();
        registry.add(&bored_dyn, ListenerToken::new());
        registry.add(&invalid_dyn, ListenerToken::new());

        registry.for_each_valid(|l| l.on_list_update());
        assert_eq!(bored.updates.get(), 1);
        assert_eq!(invalid.updates.get(), 0);
        assert_eq!(registry.len(), 1);

        // A delta pass is what drops it.
        registry.for_each(|_| {});
        assert!(registry.is_empty());
    }
}
