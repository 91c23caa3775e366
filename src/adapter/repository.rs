//! Polling adapter over item repositories.

use std::fmt;
use std::rc::{Rc, Weak};

use crate::list::AggregatedList;
use crate::monitor::{ListenerToken, MonitorId, MonitorListener, NotifyContext, Observable};
use crate::settings::{Actionable, StorageFilter, TickRateModulation};
use crate::source::ActionSource;
use crate::stack::{ResourceKey, ResourceStack};
use crate::storage::{Inventory, ItemRepository};

use super::cache::{PollState, TickAlert, TickingMonitor};

/// Adapts an [`ItemRepository`] the same way [`super::ExternalInventoryAdapter`]
/// adapts slots: snapshot each tick, diff, post.
pub struct RepositoryAdapter<K: ResourceKey> {
    backend: Rc<dyn ItemRepository<K>>,
    state: PollState<K>,
}

impl<K: ResourceKey> RepositoryAdapter<K> {
    #[must_use]
    pub fn new(backend: Rc<dyn ItemRepository<K>>) -> Self {
        let initial = read_all(backend.as_ref());
        Self {
            backend,
            state: PollState::new(initial),
        }
    }

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

fn read_all<K: ResourceKey>(backend: &dyn ItemRepository<K>) -> AggregatedList<K> {
    backend
        .all_items()
        .into_iter()
        .filter(|s| s.amount() > 0)
        .collect()
}

impl<K: ResourceKey> Inventory<K> for RepositoryAdapter<K> {
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
        let remaining = self
            .backend
            .insert(input.clone(), simulate)
            .filter(|s| s.amount() > 0);

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
        if request.amount() <= 0 {
            return None;
        }
        let simulate = mode.is_simulate();
        let got = self
            .backend
            .extract(request.key(), request.amount(), simulate)
            .filter(|s| s.key() == request.key())
            .map_or(0, |s| s.amount());
        if got <= 0 {
            return None;
        }

        let got = if got > request.amount() {
            tracing::warn!(
                backend = self.backend.name(),
                requested = request.amount(),
                returned = got,
                "backend returned more than requested, excess discarded"
            );
            request.amount()
        } else {
            got
        };
        if !simulate {
            self.state.known_change(request.key(), -got);
        }
        Some(request.with_amount(got))
    }

    fn available(&self, out: &mut AggregatedList<K>) {
        self.state.available(out);
    }
}

impl<K: ResourceKey> TickingMonitor<K> for RepositoryAdapter<K> {
    fn on_tick(&self, ctx: &mut NotifyContext) -> TickRateModulation {
        let fresh = read_all(self.backend.as_ref());
        self.state.finish_tick(fresh, ctx)
    }

    fn set_action_source(&self, src: ActionSource) {
        self.state.set_source(src);
    }

    // Repositories expose only extractable totals.
    fn set_storage_filter(&self, filter: StorageFilter) {
        self.state.set_filter(filter);
    }
}

impl<K: ResourceKey> Observable<K> for RepositoryAdapter<K> {
    fn add_listener(&self, listener: &Rc<dyn MonitorListener<K>>, token: ListenerToken) {
        self.state.add_listener(listener, token);
    }

    fn remove_listener(&self, listener: &Rc<dyn MonitorListener<K>>) {
        self.state.remove_listener(listener);
    }
}

impl<K: ResourceKey> fmt::Debug for RepositoryAdapter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryAdapter")
            .field("backend", &self.backend.name())
            .field("id", &self.state.id())
            .finish_non_exhaustive()
    }
}
