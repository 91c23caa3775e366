//! Grid-wide storage state: per-channel totals and the coarse event queue.
//!
//! Events are enqueued with a bounded channel and never block the caller.
//! When the queue is full the event is dropped and counted; the consumer
//! drains the queue once per tick.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stack::ChannelId;

/// What happened on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridEventKind {
    /// Contents of `channel` changed during the last tick.
    StorageChanged { channel: ChannelId },
    /// A storage provider's handlers changed; cell arrays must be re-read.
    CellArrayUpdate,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GridEvent {
    pub kind: GridEventKind,
    pub timestamp: DateTime<Utc>,
}

impl GridEvent {
    #[must_use]
    pub fn now(kind: GridEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridEventConfig {
    /// Max queued events before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for GridEventConfig {
    fn default() -> Self {
        Self { queue_capacity: 1024 }
    }
}

impl GridEventConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

/// Running totals per channel plus the grid event queue.
#[derive(Debug)]
pub struct GridStorage {
    totals: RefCell<BTreeMap<ChannelId, i64>>,
    tx: Sender<GridEvent>,
    rx: Receiver<GridEvent>,
    dropped_events: Cell<u64>,
    active: Cell<bool>,
}

impl GridStorage {
    pub fn new(config: GridEventConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (tx, rx) = bounded(config.queue_capacity);
        Ok(Self {
            totals: RefCell::new(BTreeMap::new()),
            tx,
            rx,
            dropped_events: Cell::new(0),
            active: Cell::new(true),
        })
    }

    #[must_use]
    pub fn total(&self, channel: ChannelId) -> i64 {
        self.totals.borrow().get(&channel).copied().unwrap_or(0)
    }

    pub fn add_to_total(&self, channel: ChannelId, delta: i64) {
        let mut totals = self.totals.borrow_mut();
        let total = totals.entry(channel).or_insert(0);
        *total = total.saturating_add(delta);
    }

    pub fn set_total(&self, channel: ChannelId, total: i64) {
        self.totals.borrow_mut().insert(channel, total);
    }

    /// Enqueue an event without blocking. Returns false if it was dropped.
    pub fn post_event(&self, kind: GridEventKind) -> bool {
        match self.tx.try_send(GridEvent::now(kind)) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => {
                self.dropped_events.set(self.dropped_events.get() + 1);
                false
            }
        }
    }

    /// Takes every queued event.
    pub fn drain_events(&self) -> Vec<GridEvent> {
        self.rx.try_iter().collect()
    }

    #[must_use]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.get()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Powers the grid on or off.
    pub fn set_active(&self, active: bool) {
        self.active.set(active);
    }
}

impl Default for GridStorage {
    fn default() -> Self {
        let (tx, rx) = bounded(GridEventConfig::default().queue_capacity);
        Self {
            totals: RefCell::new(BTreeMap::new()),
            tx,
            rx,
            dropped_events: Cell::new(0),
            active: Cell::new(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_are_keyed_by_channel() {
        let grid = GridStorage::default();
        grid.add_to_total(ChannelId::ITEMS, 10);
        grid.add_to_total(ChannelId::ITEMS, -3);
        grid.add_to_total(ChannelId::FLUIDS, 1000);
        assert_eq!(grid.total(ChannelId::ITEMS), 7);
        assert_eq!(grid.total(ChannelId::FLUIDS), 1000);

        grid.set_total(ChannelId::ITEMS, 42);
        assert_eq!(grid.total(ChannelId::ITEMS), 42);
    }

    #[test]
    fn full_queue_drops_and_counts() {
        let grid = GridStorage::new(GridEventConfig { queue_capacity: 2 }).unwrap();
        assert!(grid.post_event(GridEventKind::CellArrayUpdate));
        assert!(grid.post_event(GridEventKind::CellArrayUpdate));
        assert!(!grid.post_event(GridEventKind::CellArrayUpdate));
        assert_eq!(grid.dropped_events(), 1);
        assert_eq!(grid.drain_events().len(), 2);
        assert!(grid.drain_events().is_empty());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            GridStorage::new(GridEventConfig { queue_capacity: 0 }).err(),
            Some(ConfigError::ZeroQueueCapacity)
        );
    }
}
