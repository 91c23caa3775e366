//! Poll-and-diff state shared by the polling adapters.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::list::{diff, AggregatedList};
use crate::monitor::{ListenerRegistry, ListenerToken, MonitorId, MonitorListener, NotifyContext};
use crate::settings::{StorageFilter, TickRateModulation};
use crate::source::ActionSource;
use crate::stack::{ResourceKey, ResourceStack};

/// Asks the scheduler to tick a device soon.
pub trait TickAlert {
    fn alert(&self);
}

/// A monitor that only learns about changes by being ticked.
pub trait TickingMonitor<K: ResourceKey> {
    /// Poll the backend and post any changes to listeners.
    fn on_tick(&self, ctx: &mut NotifyContext) -> TickRateModulation;

    /// Source attached to posted changes.
    fn set_action_source(&self, src: ActionSource);

    fn set_storage_filter(&self, filter: StorageFilter);
}

/// Last snapshot of a backend.
#[derive(Debug, Clone, Default)]
pub(crate) struct PollingCache<K: ResourceKey> {
    snapshot: AggregatedList<K>,
}

impl<K: ResourceKey> PollingCache<K> {
    #[must_use]
    pub fn new(initial: AggregatedList<K>) -> Self {
        Self { snapshot: initial }
    }

    /// Replaces the snapshot with `fresh` and returns what changed.
    pub fn update(&mut self, fresh: AggregatedList<K>) -> Vec<ResourceStack<K>> {
        let changes = diff(&self.snapshot, &fresh);
        self.snapshot = fresh;
        changes
    }

    /// Applies a change the adapter made itself, so the next poll does not
    /// report it again.
    pub fn fold(&mut self, key: &K, delta: i64) {
        self.snapshot.add_amount(key, delta);
    }

    #[must_use]
    pub const fn snapshot(&self) -> &AggregatedList<K> {
        &self.snapshot
    }
}

/// Listener set, cache and scheduling hooks of one polling adapter.
pub(crate) struct PollState<K: ResourceKey> {
    id: MonitorId,
    listeners: ListenerRegistry<K>,
    cache: RefCell<PollingCache<K>>,
    source: RefCell<ActionSource>,
    filter: RefCell<StorageFilter>,
    alert: Option<Weak<dyn TickAlert>>,
}

impl<K: ResourceKey> PollState<K> {
    pub(crate) fn new(initial: AggregatedList<K>) -> Self {
        Self {
            id: MonitorId::new(),
            listeners: ListenerRegistry::new(),
            cache: RefCell::new(PollingCache::new(initial)),
            source: RefCell::new(ActionSource::Anonymous),
            filter: RefCell::new(StorageFilter::default()),
            alert: None,
        }
    }

    pub(crate) fn set_alert(&mut self, alert: Option<Weak<dyn TickAlert>>) {
        self.alert = alert;
    }

    pub(crate) fn id(&self) -> MonitorId {
        self.id
    }

    pub(crate) fn filter(&self) -> StorageFilter {
        *self.filter.borrow()
    }

    pub(crate) fn set_filter(&self, filter: StorageFilter) {
        *self.filter.borrow_mut() = filter;
    }

    pub(crate) fn set_source(&self, src: ActionSource) {
        *self.source.borrow_mut() = src;
    }

    pub(crate) fn add_listener(&self, listener: &Rc<dyn MonitorListener<K>>, token: ListenerToken) {
        self.listeners.add(listener, token);
    }

    pub(crate) fn remove_listener(&self, listener: &Rc<dyn MonitorListener<K>>) {
        self.listeners.remove(listener);
    }

    /// Records a committed change of our own and requests a prompt re-tick.
    pub(crate) fn known_change(&self, key: &K, delta: i64) {
        if delta == 0 {
            return;
        }
        self.cache.borrow_mut().fold(key, delta);
        if let Some(alert) = self.alert.as_ref().and_then(Weak::upgrade) {
            alert.alert();
        }
    }

    pub(crate) fn available(&self, out: &mut AggregatedList<K>) {
        out.add_all(self.cache.borrow().snapshot());
    }

    /// Diffs `fresh` against the cache, posts the changes and picks the next
    /// tick rate.
    pub(crate) fn finish_tick(&self, fresh: AggregatedList<K>, ctx: &mut NotifyContext) -> TickRateModulation {
        let changes = self.cache.borrow_mut().update(fresh);
        if changes.is_empty() {
            return TickRateModulation::Slower;
        }
        tracing::trace!(adapter = %self.id, lines = changes.len(), "poll found changes");

        let src = self.source.borrow().clone();
        let id = self.id;
        self.listeners.for_each(|l| l.post_change(id, &changes, &src, ctx));
        TickRateModulation::Urgent
    }
}
