//! A device's connection to its grid and tick scheduler.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::adapter::TickAlert;
use crate::error::GridError;
use crate::monitor::{GridEventKind, GridStorage, NetworkMonitor};
use crate::source::NodeId;
use crate::stack::ResourceKey;

/// The external tick scheduler.
pub trait TickManager {
    /// Tick `node` as soon as possible.
    fn alert_device(&self, node: NodeId);

    fn sleep_device(&self, node: NodeId);

    fn wake_device(&self, node: NodeId);
}

/// Weak handles to the grid a device is attached to.
///
/// Every accessor returns a [`GridError`] when the grid part is missing;
/// callers skip whatever depended on it.
pub struct GridLink<K: ResourceKey> {
    node: NodeId,
    monitor: RefCell<Option<Weak<NetworkMonitor<K>>>>,
    ticks: RefCell<Option<Weak<dyn TickManager>>>,
    powered: Cell<bool>,
}

impl<K: ResourceKey> GridLink<K> {
    #[must_use]
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            monitor: RefCell::new(None),
            ticks: RefCell::new(None),
            powered: Cell::new(true),
        }
    }

    #[must_use]
    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Attaches the link to a network's monitor and, optionally, its scheduler.
    pub fn connect(&self, monitor: &Rc<NetworkMonitor<K>>, ticks: Option<&Rc<dyn TickManager>>) {
        *self.monitor.borrow_mut() = Some(Rc::downgrade(monitor));
        *self.ticks.borrow_mut() = ticks.map(Rc::downgrade);
    }

    pub fn disconnect(&self) {
        self.monitor.borrow_mut().take();
        self.ticks.borrow_mut().take();
    }

    /// Node power / channel state.
    pub fn set_powered(&self, powered: bool) {
        self.powered.set(powered);
    }

    pub fn monitor(&self) -> Result<Rc<NetworkMonitor<K>>, GridError> {
        if !self.powered.get() {
            return Err(GridError::NodeInactive);
        }
        self.monitor
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(GridError::GridUnavailable)
    }

    pub fn grid(&self) -> Result<Rc<GridStorage>, GridError> {
        let grid = self.monitor()?.grid().clone();
        if grid.is_active() {
            Ok(grid)
        } else {
            Err(GridError::GridUnavailable)
        }
    }

    pub fn tick_manager(&self) -> Result<Rc<dyn TickManager>, GridError> {
        self.ticks
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(GridError::NoTickManager)
    }

    /// Powered, connected and the grid is up.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.grid().is_ok()
    }

    pub fn post_event(&self, kind: GridEventKind) -> Result<(), GridError> {
        self.grid()?.post_event(kind);
        Ok(())
    }
}

impl<K: ResourceKey> TickAlert for GridLink<K> {
    fn alert(&self) {
        match self.tick_manager() {
            Ok(ticks) => ticks.alert_device(self.node),
            Err(err) => tracing::debug!(node = %self.node, %err, "alert skipped"),
        }
    }
}

impl<K: ResourceKey> fmt::Debug for GridLink<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridLink")
            .field("node", &self.node)
            .field("powered", &self.powered.get())
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::ItemKey;
    use crate::storage::NetworkInventory;

    fn monitor() -> Rc<NetworkMonitor<ItemKey>> {
        let network = Rc::new(NetworkInventory::<ItemKey>::new());
        Rc::new(NetworkMonitor::<ItemKey>::new(network, Rc::new(GridStorage::default())))
    }

    #[test]
    fn unconnected_link_reports_errors() {
        let link = GridLink::<ItemKey>::new(NodeId::new());
        assert_eq!(link.monitor().err(), Some(GridError::GridUnavailable));
        assert_eq!(link.tick_manager().err(), Some(GridError::NoTickManager));
        assert!(!link.is_active());
        assert!(link.post_event(GridEventKind::CellArrayUpdate).is_err());
    }

    #[test]
    fn active_requires_power_and_grid() {
        let monitor = monitor();
        let link = GridLink::new(NodeId::new());
        link.connect(&monitor, None);
        assert!(link.is_active());

        link.set_powered(false);
        assert_eq!(link.monitor().err(), Some(GridError::NodeInactive));
        link.set_powered(true);

        monitor.grid().set_active(false);
        assert!(!link.is_active());
        monitor.grid().set_active(true);

        link.post_event(GridEventKind::CellArrayUpdate).unwrap();
        assert_eq!(monitor.grid().drain_events().len(), 1);

        drop(monitor);
        assert!(!link.is_active());
    }

    #[test]
    fn disconnect_forgets_the_grid() {
        let monitor = monitor();
        let link = GridLink::new(NodeId::new());
        link.connect(&monitor, None);
        assert!(link.is_active());

        link.disconnect();
        assert!(!link.is_active());
        assert_eq!(link.monitor().err(), Some(GridError::GridUnavailable));
        assert_eq!(link.tick_manager().err(), Some(GridError::NoTickManager));
    }
}
