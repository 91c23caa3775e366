//! Polling adapter over slot-addressed backends.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::list::AggregatedList;
use crate::monitor::{ListenerToken, MonitorId, MonitorListener, NotifyContext, Observable};
use crate::settings::{Actionable, StorageFilter, TickRateModulation};
use crate::source::ActionSource;
use crate::stack::{ResourceKey, ResourceStack};
use crate::storage::{Inventory, SlotBackend};

use super::cache::{PollState, TickAlert, TickingMonitor};

/// Turns a [`SlotBackend`] without change notification into an observable
/// inventory by scanning it every tick.
pub struct ExternalInventoryAdapter<K: ResourceKey> {
    backend: Rc<dyn SlotBackend<K>>,
    state: PollState<K>,
}

impl<K: ResourceKey> ExternalInventoryAdapter<K> {
    /// Wraps `backend` and takes the initial snapshot, honoring `filter`.
    #[must_use]
    pub fn new(backend: Rc<dyn SlotBackend<K>>, filter: StorageFilter) -> Self {
        let initial = scan(backend.as_ref(), filter);
        let state = PollState::new(initial);
        state.set_filter(filter);
        Self { backend, state }
    }

    /// Device to alert after a committed change.
    #[must_use]
    pub fn with_alert(mut self, alert: Option<Weak<dyn TickAlert>>) -> Self {
        self.state.set_alert(alert);
        self
    }

    #[must_use]
    pub fn id(&self) -> MonitorId {
        self.state.id()
    }
}

fn scan<K: ResourceKey>(backend: &dyn SlotBackend<K>, filter: StorageFilter) -> AggregatedList<K> {
    let mut out = AggregatedList::new();
    for slot in 0..backend.slot_count() {
        if filter == StorageFilter::ExtractableOnly && !backend.is_extractable(slot) {
            continue;
        }
        if let Some(stack) = backend.stack_in_slot(slot) {
            out.add(&stack);
        }
    }
    out
}

impl<K: ResourceKey> Inventory<K> for ExternalInventoryAdapter<K> {
    fn insert(
        &self,
        input: ResourceStack<K>,
        mode: Actionable,
        _src: &ActionSource,
        _ctx: &mut NotifyContext,
    ) -> Option<ResourceStack<K>> {
        if input.amount() <= 0 {
            return Some(input);
        }
        let simulate = mode.is_simulate();
        let mut remaining = Some(input.clone());

        for slot in 0..self.backend.slot_count() {
            let Some(stack) = remaining.take() else {
                break;
            };
            remaining = self.backend.insert_at(slot, stack, simulate).filter(|s| s.amount() > 0);
        }

        let left = remaining.as_ref().map_or(0, ResourceStack::amount);
        if left >= input.amount() {
            return Some(input);
        }
        if !simulate {
            self.state.known_change(input.key(), input.amount() - left);
        }
        remaining
    }

    fn extract(
        &self,
        request: ResourceStack<K>,
        mode: Actionable,
        _src: &ActionSource,
        _ctx: &mut NotifyContext,
    ) -> Option<ResourceStack<K>> {
        let simulate = mode.is_simulate();
        let mut remaining = request.amount();
        let mut gathered: i64 = 0;

        for slot in 0..self.backend.slot_count() {
            if remaining <= 0 {
                break;
            }
            let Some(in_slot) = self.backend.stack_in_slot(slot) else {
                continue;
            };
            if in_slot.key() != request.key() || in_slot.amount() <= 0 {
                continue;
            }

            let slot_start = remaining.min(in_slot.amount());
            let mut slot_remaining = slot_start;
            loop {
                let got = self
                    .backend
                    .extract_at(slot, slot_remaining, simulate)
                    .filter(|s| s.key() == request.key())
                    .map_or(0, |s| s.amount());
                if got <= 0 {
                    break;
                }
                let got = if got > slot_remaining {
                    tracing::warn!(
                        backend = self.backend.name(),
                        slot,
                        requested = slot_remaining,
                        returned = got,
                        "backend returned more than requested, excess discarded"
                    );
                    slot_remaining
                } else {
                    got
                };
                gathered += got;
                slot_remaining -= got;
                if simulate || slot_remaining <= 0 {
                    break;
                }
            }
            remaining -= slot_start - slot_remaining;
        }

        if gathered <= 0 {
            return None;
        }
        if !simulate {
            self.state.known_change(request.key(), -gathered);
        }
        Some(request.with_amount(gathered))
    }

    fn available(&self, out: &mut AggregatedList<K>) {
        self.state.available(out);
    }
}

impl<K: ResourceKey> TickingMonitor<K> for ExternalInventoryAdapter<K> {
    fn on_tick(&self, ctx: &mut NotifyContext) -> TickRateModulation {
        let fresh = scan(self.backend.as_ref(), self.state.filter());
        self.state.finish_tick(fresh, ctx)
    }

    fn set_action_source(&self, src: ActionSource) {
        self.state.set_source(src);
    }

    fn set_storage_filter(&self, filter: StorageFilter) {
        self.state.set_filter(filter);
    }
}

impl<K: ResourceKey> Observable<K> for ExternalInventoryAdapter<K> {
    fn add_listener(&self, listener: &Rc<dyn MonitorListener<K>>, token: ListenerToken) {
        self.state.add_listener(listener, token);
    }

    fn remove_listener(&self, listener: &Rc<dyn MonitorListener<K>>) {
        self.state.remove_listener(listener);
    }
}

impl<K: ResourceKey> fmt::Debug for ExternalInventoryAdapter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalInventoryAdapter")
            .field("backend", &self.backend.name())
            .field("id", &self.state.id())
            .finish_non_exhaustive()
    }
}
