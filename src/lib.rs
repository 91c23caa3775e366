//! # gridstore - networked storage aggregation
//!
//! gridstore keeps a consistent, incrementally updated view of resources spread
//! across many independently owned storage backends, and delivers each net
//! change to interested observers exactly once, even when observing a change
//! triggers further changes.
//!
//! ## Core Concepts
//!
//! - **ResourceStack**: a resource identity with a signed quantity
//! - **InventoryHandler**: one backend behind access, priority and partition rules
//! - **NetworkMonitor**: one channel's aggregation point; announces net deltas
//! - **ExternalInventoryAdapter**: turns a notification-less backend into an
//!   event source by polling and diffing
//! - **StorageBus**: lazily binds whatever backend it faces and drives its ticks
//!
//! Execution is single-threaded and cooperative. Every mutating call takes a
//! [`NotifyContext`] that tracks announcements in flight.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use gridstore::{
//!     Actionable, ActionSource, GridStorage, ItemKey, NetworkInventory, NetworkMonitor,
//!     NotifyContext, ResourceStack,
//! };
//!
//! let network = Rc::new(NetworkInventory::<ItemKey>::new());
//! let monitor = NetworkMonitor::new(network.clone(), Rc::new(GridStorage::default()));
//!
//! let mut ctx = NotifyContext::new();
//! let stone = ResourceStack::new(ItemKey::new("stone"), 64);
//! let rest = monitor.insert(stone, Actionable::Modulate, &ActionSource::Anonymous, &mut ctx);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod error;
pub mod list;
pub mod settings;
pub mod source;
pub mod stack;

// Storage, notification and binding
pub mod adapter;
pub mod bus;
pub mod monitor;
pub mod storage;

// Re-export primary types at crate root for convenience
pub use error::{ConfigError, GridError, StoreError, StoreResult};
pub use list::{diff, AggregatedList};
pub use settings::{
    AccessRestriction, Actionable, FuzzyMode, IncludeExclude, StorageFilter, TickRateModulation, TickRates,
    TickingRequest,
};
pub use source::{ActionSource, NodeId};
pub use stack::{ChannelId, FluidKey, ItemKey, ResourceKey, ResourceStack};

pub use adapter::{
    ExternalInventoryAdapter, Fingerprint, RepositoryAdapter, StrategyChain, TickAlert, TickingMonitor,
};
pub use bus::{BindingState, BusConfig, GridLink, StorageBus, TickManager, Upgrades};
pub use monitor::{
    GridEvent, GridEventConfig, GridEventKind, GridStorage, InterestManager, InterestRegistry, ListenerToken,
    MonitorId, MonitorListener, NetworkMonitor, NotifyContext, Observable, StackWatcherHost,
};
pub use storage::{
    BackendId, HandlerId, Inventory, InventoryHandler, ItemRepository, MemoryRepository, NativeStorage,
    NetworkInventory, PartitionList, SlotBackend, SlotInventory, StorageAccessor, StorageTarget,
};
