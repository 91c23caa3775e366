//! The network monitor: one channel's aggregation point.
//!
//! Every committed insert or extract records its own signed effect into a
//! pending delta. The delta is announced only when the outermost call on this
//! monitor unwinds, so mutations made from inside a nested call (a reacting
//! listener on a sub-network, a backend side effect) coalesce into one net
//! announcement instead of a burst of intermediate ones.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

use crate::list::AggregatedList;
use crate::settings::{AccessRestriction, Actionable};
use crate::source::ActionSource;
use crate::stack::{ResourceKey, ResourceStack};
use crate::storage::Inventory;

use super::context::NotifyContext;
use super::grid::{GridEventKind, GridStorage};
use super::interest::InterestRegistry;
use super::listener::{ListenerRegistry, ListenerToken, MonitorListener, Observable};

/// Identity of one monitor instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorId(Uuid);

impl MonitorId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for MonitorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MonitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wraps the network inventory of one channel and announces net deltas.
pub struct NetworkMonitor<K: ResourceKey> {
    id: MonitorId,
    handler: Rc<dyn Inventory<K>>,
    grid: Rc<GridStorage>,
    interest: Option<Rc<dyn InterestRegistry<K>>>,
    listeners: ListenerRegistry<K>,
    cached: RefCell<AggregatedList<K>>,
    dirty: Cell<bool>,
    depth: Cell<u32>,
    pending: RefCell<AggregatedList<K>>,
    send_event: Cell<bool>,
}

impl<K: ResourceKey> NetworkMonitor<K> {
    #[must_use]
    pub fn new(handler: Rc<dyn Inventory<K>>, grid: Rc<GridStorage>) -> Self {
        Self {
            id: MonitorId::new(),
            handler,
            grid,
            interest: None,
            listeners: ListenerRegistry::new(),
            cached: RefCell::new(AggregatedList::new()),
            dirty: Cell::new(true),
            depth: Cell::new(0),
            pending: RefCell::new(AggregatedList::new()),
            send_event: Cell::new(false),
        }
    }

    /// Attaches the interest registry consulted on every announcement.
    #[must_use]
    pub fn with_interest(mut self, interest: Rc<dyn InterestRegistry<K>>) -> Self {
        self.interest = Some(interest);
        self
    }

    #[must_use]
    pub const fn id(&self) -> MonitorId {
        self.id
    }

    #[must_use]
    pub fn grid(&self) -> &Rc<GridStorage> {
        &self.grid
    }

    #[must_use]
    pub fn handler(&self) -> &Rc<dyn Inventory<K>> {
        &self.handler
    }

    /// Running total of this monitor's channel.
    #[must_use]
    pub fn running_total(&self) -> i64 {
        self.grid.total(K::CHANNEL)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// The aggregated contents, rebuilt first if marked dirty.
    pub fn snapshot(&self) -> AggregatedList<K> {
        if self.dirty.replace(false) {
            let mut fresh = AggregatedList::new();
            self.handler.available(&mut fresh);
            self.cached.replace(fresh);
        }
        self.cached.borrow().clone()
    }

    /// Rebuilds the snapshot, recomputes the running total from it and tells
    /// every valid listener that the list was replaced.
    pub fn force_refresh(&self) {
        self.dirty.set(true);
        let snapshot = self.snapshot();
        self.grid.set_total(K::CHANNEL, snapshot.total());
        tracing::debug!(
            monitor = %self.id,
            channel = %K::CHANNEL,
            lines = snapshot.len(),
            total = snapshot.total(),
            "forced storage refresh"
        );
        self.listeners.for_each_valid(|l| l.on_list_update());
    }

    /// Announce changes made behind the monitor's back, typically by a
    /// sub-network or a polling adapter.
    ///
    /// Changes arriving while one of this monitor's own calls is in flight
    /// are dropped: the outer call already accounts for them.
    ///
    /// # Panics
    /// If this monitor is already announcing on `ctx`.
    pub fn post_alteration(&self, changes: &[ResourceStack<K>], src: &ActionSource, ctx: &mut NotifyContext) {
        if ctx.is_announcing(self.id) {
            // Reuse the context's own violation report.
            ctx.enter(self.id);
        }
        if self.depth.get() > 0 {
            tracing::trace!(monitor = %self.id, lines = changes.len(), "alteration inside own call dropped");
            return;
        }
        let changes: Vec<_> = changes.iter().filter(|c| !c.is_empty()).cloned().collect();
        if !changes.is_empty() {
            self.announce(&changes, src, ctx);
            self.flush(src, ctx);
        }
    }

    /// Emits at most one coarse `StorageChanged` event per tick.
    pub fn on_tick(&self) {
        if !self.send_event.replace(false) {
            return;
        }
        if self.grid.is_active() {
            self.grid.post_event(GridEventKind::StorageChanged { channel: K::CHANNEL });
        } else {
            tracing::debug!(channel = %K::CHANNEL, "grid inactive, storage change event skipped");
        }
    }

    fn record(&self, key: &K, delta: i64) {
        if delta != 0 {
            self.pending.borrow_mut().add_amount(key, delta);
        }
    }

    fn flush(&self, src: &ActionSource, ctx: &mut NotifyContext) {
        while self.depth.get() == 0 {
            let changes = {
                let mut pending = self.pending.borrow_mut();
                if pending.is_empty() {
                    break;
                }
                std::mem::take(&mut *pending).to_stacks()
            };
            self.announce(&changes, src, ctx);
        }
    }

    fn announce(&self, changes: &[ResourceStack<K>], src: &ActionSource, ctx: &mut NotifyContext) {
        ctx.enter(self.id);
        self.depth.set(self.depth.get() + 1);

        for change in changes {
            self.grid.add_to_total(K::CHANNEL, change.amount());
        }
        tracing::trace!(monitor = %self.id, channel = %K::CHANNEL, lines = changes.len(), "announcing");

        if let Some(interest) = &self.interest {
            interest.begin_batch();
            for change in changes {
                for watcher in interest.watchers(change.key()) {
                    watcher.on_stack_change(change, K::CHANNEL, ctx);
                }
            }
            interest.end_batch();
        }

        self.dirty.set(true);
        let id = self.id;
        self.listeners.for_each(|l| l.post_change(id, changes, src, ctx));

        self.depth.set(self.depth.get() - 1);
        ctx.leave(self.id);
        self.send_event.set(true);
    }
}

impl<K: ResourceKey> Inventory<K> for NetworkMonitor<K> {
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
        if mode.is_simulate() {
            return self.handler.insert(input, mode, src, ctx);
        }
        let key = input.key().clone();
        let requested = input.amount();

        self.depth.set(self.depth.get() + 1);
        let leftover = self.handler.insert(input, mode, src, ctx);
        self.depth.set(self.depth.get() - 1);

        self.record(&key, requested - leftover.as_ref().map_or(0, ResourceStack::amount));
        self.flush(src, ctx);
        leftover
    }

    fn extract(
        &self,
        request: ResourceStack<K>,
        mode: Actionable,
        src: &ActionSource,
        ctx: &mut NotifyContext,
    ) -> Option<ResourceStack<K>> {
        if request.amount() <= 0 {
            return None;
        }
        if mode.is_simulate() {
            return self.handler.extract(request, mode, src, ctx);
        }
        let key = request.key().clone();

        self.depth.set(self.depth.get() + 1);
        let extracted = self.handler.extract(request, mode, src, ctx);
        self.depth.set(self.depth.get() - 1);

        self.record(&key, extracted.as_ref().map_or(0, |taken| taken.negated().amount()));
        self.flush(src, ctx);
        extracted
    }

    fn available(&self, out: &mut AggregatedList<K>) {
        out.add_all(&self.snapshot());
    }

    fn access(&self) -> AccessRestriction {
        self.handler.access()
    }
}

impl<K: ResourceKey> Observable<K> for NetworkMonitor<K> {
    fn add_listener(&self, listener: &Rc<dyn MonitorListener<K>>, token: ListenerToken) {
        self.listeners.add(listener, token);
    }

    fn remove_listener(&self, listener: &Rc<dyn MonitorListener<K>>) {
        self.listeners.remove(listener);
    }
}

impl<K: ResourceKey> fmt::Debug for NetworkMonitor<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("id", &self.id)
            .field("channel", &K::CHANNEL)
            .field("listeners", &self.listeners)
            .field("depth", &self.depth.get())
            .finish_non_exhaustive()
    }
}
