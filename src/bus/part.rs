//! The storage bus: binds whatever backend it faces into the network.
//!
//! Binding is lazy. The bus keeps a [`HandlerCacheEntry`] with the backend
//! fingerprint, the handler built for it and the polling monitor (if any). The
//! entry is reused until a reset is scheduled; even then the handler survives
//! a partial reset when the fingerprint comes out unchanged.
//!
//! Reset triggers:
//! - neighbor vanished: immediate full reset
//! - neighbor changed: partial reset on the next tick
//! - configuration edited: full reset on the next tick

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::adapter::{BindContext, Fingerprint, StrategyChain, TickAlert, TickingMonitor};
use crate::error::StoreResult;
use crate::list::{diff, AggregatedList};
use crate::monitor::{GridEventKind, ListenerToken, MonitorId, MonitorListener, NotifyContext, Observable};
use crate::settings::{
    AccessRestriction, FuzzyMode, StorageFilter, TickRateModulation, TickRates, TickingRequest,
};
use crate::source::{ActionSource, NodeId};
use crate::stack::{ChannelId, ResourceKey, ResourceStack};
use crate::storage::{Inventory, InventoryHandler, StorageTarget};

use super::config::{BusConfig, Upgrades};
use super::link::GridLink;

/// Pending invalidation. Later requests only ever escalate it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResetKind {
    /// Nothing pending.
    None,
    /// Re-fingerprint; keep the handler if the backend looks the same.
    Partial,
    /// Rebuild the handler unconditionally.
    Full,
}

/// Where the bus is in its binding lifecycle.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    Uninitialized,
    Cached,
    Invalidated,
}

/// The currently resolved backend binding.
pub struct HandlerCacheEntry<K: ResourceKey> {
    fingerprint: Option<Fingerprint>,
    handler: Option<Rc<InventoryHandler<K>>>,
    monitor: Option<Rc<dyn TickingMonitor<K>>>,
    observable: Option<Rc<dyn Observable<K>>>,
}

impl<K: ResourceKey> Default for HandlerCacheEntry<K> {
    fn default() -> Self {
        Self {
            fingerprint: None,
            handler: None,
            monitor: None,
            observable: None,
        }
    }
}

impl<K: ResourceKey> HandlerCacheEntry<K> {
    #[must_use]
    pub const fn fingerprint(&self) -> Option<Fingerprint> {
        self.fingerprint
    }

    #[must_use]
    pub fn handler(&self) -> Option<&Rc<InventoryHandler<K>>> {
        self.handler.as_ref()
    }

    /// True when the bound backend has to be polled.
    #[must_use]
    pub fn is_polled(&self) -> bool {
        self.monitor.is_some()
    }
}

/// Exposes one adjacent backend to the network as a storage cell.
pub struct StorageBus<K: ResourceKey> {
    me: Weak<StorageBus<K>>,
    source: ActionSource,
    link: Rc<GridLink<K>>,
    strategies: StrategyChain<K>,
    rates: TickRates,
    config: RefCell<BusConfig<K>>,
    target: RefCell<Option<Rc<dyn StorageTarget<K>>>>,
    entry: RefCell<HandlerCacheEntry<K>>,
    pending_reset: Cell<ResetKind>,
    resolved_once: Cell<bool>,
    was_active: Cell<bool>,
    sleeping: Cell<bool>,
}

impl<K: ResourceKey> StorageBus<K> {
    /// Creates a bus using the default strategy chain.
    pub fn new(node: NodeId, config: BusConfig<K>) -> StoreResult<Rc<Self>> {
        Self::with_strategies(node, config, StrategyChain::default_chain())
    }

    pub fn with_strategies(node: NodeId, config: BusConfig<K>, strategies: StrategyChain<K>) -> StoreResult<Rc<Self>> {
        config.validate()?;
        Ok(Rc::new_cyclic(|me| Self {
            me: me.clone(),
            source: ActionSource::machine(node),
            link: Rc::new(GridLink::new(node)),
            strategies,
            rates: TickRates::STORAGE_BUS,
            config: RefCell::new(config),
            target: RefCell::new(None),
            entry: RefCell::new(HandlerCacheEntry::default()),
            pending_reset: Cell::new(ResetKind::None),
            resolved_once: Cell::new(false),
            was_active: Cell::new(false),
            sleeping: Cell::new(true),
        }))
    }

    #[must_use]
    pub fn node(&self) -> NodeId {
        self.link.node()
    }

    #[must_use]
    pub fn link(&self) -> &Rc<GridLink<K>> {
        &self.link
    }

    #[must_use]
    pub fn config(&self) -> BusConfig<K> {
        self.config.borrow().clone()
    }

    #[must_use]
    pub fn binding_state(&self) -> BindingState {
        if !self.resolved_once.get() {
            BindingState::Uninitialized
        } else if self.pending_reset.get() == ResetKind::None {
            BindingState::Cached
        } else {
            BindingState::Invalidated
        }
    }

    /// Fingerprint of the cached binding, if any.
    #[must_use]
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.entry.borrow().fingerprint()
    }

    /// The cached handler without resolving.
    #[must_use]
    pub fn cached_handler(&self) -> Option<Rc<InventoryHandler<K>>> {
        self.entry.borrow().handler().cloned()
    }

    /// Registration request for the tick scheduler.
    #[must_use]
    pub fn ticking_request(&self) -> TickingRequest {
        TickingRequest {
            rates: self.rates,
            is_sleeping: self.sleeping.get(),
            can_be_alerted: true,
        }
    }

    /// Replaces the adjacent backend.
    ///
    /// A vanished neighbor resets immediately; a new or changed one is picked
    /// up on the next tick.
    pub fn set_target(&self, target: Option<Rc<dyn StorageTarget<K>>>, ctx: &mut NotifyContext) {
        let vanished = target.is_none();
        *self.target.borrow_mut() = target;
        if vanished {
            self.schedule_reset(ResetKind::Full);
            self.resolve(ctx);
        } else {
            self.schedule_reset(ResetKind::Partial);
            self.alert();
        }
    }

    /// Replaces the whole configuration.
    pub fn set_config(&self, config: BusConfig<K>) -> StoreResult<()> {
        config.validate()?;
        *self.config.borrow_mut() = config;
        self.config_changed();
        Ok(())
    }

    pub fn set_priority(&self, priority: i32) {
        self.config.borrow_mut().priority = priority;
        self.config_changed();
    }

    pub fn set_access(&self, access: AccessRestriction) {
        self.config.borrow_mut().access = access;
        self.config_changed();
    }

    pub fn set_storage_filter(&self, filter: StorageFilter) {
        self.config.borrow_mut().storage_filter = filter;
        self.config_changed();
    }

    pub fn set_fuzzy_mode(&self, mode: FuzzyMode) {
        self.config.borrow_mut().fuzzy_mode = mode;
        self.config_changed();
    }

    pub fn set_partition_slot(&self, index: usize, key: Option<K>) -> StoreResult<()> {
        self.config.borrow_mut().set_partition_slot(index, key)?;
        self.config_changed();
        Ok(())
    }

    pub fn set_upgrades(&self, upgrades: Upgrades) -> StoreResult<()> {
        {
            let mut config = self.config.borrow_mut();
            let previous = config.upgrades;
            config.upgrades = upgrades;
            if let Err(err) = config.validate() {
                config.upgrades = previous;
                return Err(err.into());
            }
        }
        self.config_changed();
        Ok(())
    }

    fn config_changed(&self) {
        self.schedule_reset(ResetKind::Full);
        self.alert();
    }

    fn schedule_reset(&self, kind: ResetKind) {
        self.pending_reset.set(self.pending_reset.get().max(kind));
    }

    fn alert(&self) {
        self.link.alert();
    }

    /// Posts `CellArrayUpdate` when the link's active state flipped. Returns
    /// whether it did.
    pub fn update_status(&self) -> bool {
        let active = self.link.is_active();
        if self.was_active.replace(active) == active {
            return false;
        }
        if let Err(err) = self.link.post_event(GridEventKind::CellArrayUpdate) {
            tracing::debug!(node = %self.node(), %err, "cell array update skipped");
        }
        true
    }

    /// Handlers this bus contributes to `channel`.
    pub fn cell_array(&self, channel: ChannelId, ctx: &mut NotifyContext) -> Vec<Rc<InventoryHandler<K>>> {
        if channel != K::CHANNEL || !self.link.is_active() {
            return Vec::new();
        }
        self.resolve(ctx).into_iter().collect()
    }

    /// Current contents as seen through the handler.
    pub fn contents(&self, ctx: &mut NotifyContext) -> AggregatedList<K> {
        self.resolve(ctx).map(|h| handler_contents(&h)).unwrap_or_default()
    }

    /// One scheduler tick.
    pub fn tick(&self, ctx: &mut NotifyContext) -> TickRateModulation {
        if self.pending_reset.get() != ResetKind::None || !self.resolved_once.get() {
            self.resolve(ctx);
        }
        let monitor = self.entry.borrow().monitor.clone();
        match monitor {
            Some(monitor) => monitor.on_tick(ctx),
            None => TickRateModulation::Sleep,
        }
    }

    /// Returns the handler for the reachable backend, rebinding if a reset is
    /// pending.
    pub fn resolve(&self, ctx: &mut NotifyContext) -> Option<Rc<InventoryHandler<K>>> {
        let reset = self.pending_reset.replace(ResetKind::None);
        if self.resolved_once.replace(true) && reset == ResetKind::None {
            return self.entry.borrow().handler.clone();
        }

        let target = self.target.borrow().clone();
        let fingerprint = target
            .as_ref()
            .and_then(|t| self.strategies.fingerprint(t.as_ref()));
        {
            let entry = self.entry.borrow();
            if reset != ResetKind::Full
                && fingerprint.is_some()
                && fingerprint == entry.fingerprint
                && entry.handler.is_some()
            {
                return entry.handler.clone();
            }
        }

        let old = self.entry.replace(HandlerCacheEntry::default());
        let before = old.handler.as_ref().map(|h| handler_contents(h)).unwrap_or_default();
        if let (Some(observable), Some(me)) = (&old.observable, self.listener()) {
            observable.remove_listener(&me);
        }

        let entry = match target {
            Some(target) => self.bind(target.as_ref(), fingerprint),
            None => HandlerCacheEntry::default(),
        };
        let handler = entry.handler.clone();
        let polled = entry.is_polled();
        tracing::debug!(
            node = %self.node(),
            reset = ?reset,
            bound = handler.is_some(),
            polled,
            "storage bus resolved"
        );
        self.entry.replace(entry);

        self.update_sleep_state(polled);
        if let Err(err) = self.link.post_event(GridEventKind::CellArrayUpdate) {
            tracing::debug!(node = %self.node(), %err, "cell array update skipped");
        }

        let changed = match (&old.handler, &handler) {
            (None, None) => false,
            (Some(a), Some(b)) => a.id() != b.id(),
            _ => true,
        };
        if changed {
            let after = handler.as_ref().map(|h| handler_contents(h)).unwrap_or_default();
            self.publish(&diff(&before, &after), ctx);
        }
        handler
    }

    fn bind(&self, target: &dyn StorageTarget<K>, fingerprint: Option<Fingerprint>) -> HandlerCacheEntry<K> {
        let config = self.config();
        let alert: Weak<dyn TickAlert> = Rc::downgrade(&self.link) as Weak<dyn TickAlert>;
        let cx = BindContext {
            source: self.source.clone(),
            filter: config.storage_filter,
            alert: Some(alert),
        };
        let Some(binding) = self.strategies.bind(target, &cx) else {
            return HandlerCacheEntry {
                fingerprint,
                ..HandlerCacheEntry::default()
            };
        };

        if let Some(monitor) = &binding.ticking {
            monitor.set_action_source(self.source.clone());
            monitor.set_storage_filter(config.storage_filter);
        }
        let handler = Rc::new(
            InventoryHandler::new(binding.inventory)
                .with_access(config.access)
                .with_priority(config.priority)
                .with_partition(config.partition_list(), config.include_exclude()),
        );
        if let (Some(observable), Some(me)) = (&binding.observable, self.listener()) {
            observable.add_listener(&me, handler.id().token());
        }

        HandlerCacheEntry {
            fingerprint,
            handler: Some(handler),
            monitor: binding.ticking,
            observable: binding.observable,
        }
    }

    fn listener(&self) -> Option<Rc<dyn MonitorListener<K>>> {
        self.me.upgrade().map(|me| me as Rc<dyn MonitorListener<K>>)
    }

    fn update_sleep_state(&self, polled: bool) {
        let sleep = !polled;
        if self.sleeping.replace(sleep) == sleep {
            return;
        }
        match self.link.tick_manager() {
            Ok(ticks) if sleep => ticks.sleep_device(self.node()),
            Ok(ticks) => ticks.wake_device(self.node()),
            Err(err) => {
                tracing::debug!(node = %self.node(), %err, "sleep state not forwarded");
                return;
            }
        }
        tracing::debug!(node = %self.node(), sleeping = sleep, "storage bus tick state changed");
    }

    fn publish(&self, changes: &[ResourceStack<K>], ctx: &mut NotifyContext) {
        if changes.is_empty() {
            return;
        }
        match self.link.monitor() {
            Ok(monitor) if self.link.is_active() => monitor.post_alteration(changes, &self.source, ctx),
            Ok(_) => tracing::debug!(node = %self.node(), "grid inactive, changes not published"),
            Err(err) => tracing::debug!(node = %self.node(), %err, "changes not published"),
        }
    }
}

fn handler_contents<K: ResourceKey>(handler: &InventoryHandler<K>) -> AggregatedList<K> {
    let mut out = AggregatedList::new();
    handler.available(&mut out);
    out
}

impl<K: ResourceKey> MonitorListener<K> for StorageBus<K> {
    fn is_valid(&self, token: &ListenerToken) -> bool {
        self.entry
            .borrow()
            .handler
            .as_ref()
            .is_some_and(|h| h.id().token() == *token)
    }

    fn post_change(
        &self,
        _origin: MonitorId,
        changes: &[ResourceStack<K>],
        _src: &ActionSource,
        ctx: &mut NotifyContext,
    ) {
        let readable = self
            .entry
            .borrow()
            .handler
            .as_ref()
            .is_some_and(|h| h.access().can_read());
        if readable {
            self.publish(changes, ctx);
        }
    }
}

impl<K: ResourceKey> fmt::Debug for StorageBus<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBus")
            .field("node", &self.node())
            .field("state", &self.binding_state())
            .field("pending_reset", &self.pending_reset.get())
            .field("sleeping", &self.sleeping.get())
            .finish_non_exhaustive()
    }
}
