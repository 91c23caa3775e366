//! Backend adapters.
//!
//! Polling adapters turn notification-less backends into observable
//! inventories; the strategy chain decides which adapter (if any) a reachable
//! backend gets.

mod cache;
mod repository;
mod slots;
mod strategy;

pub use cache::{TickAlert, TickingMonitor};
pub use repository::RepositoryAdapter;
pub use slots::ExternalInventoryAdapter;
pub use strategy::{
    AdapterStrategy, BindContext, Binding, Fingerprint, NativeStrategy, Probe, RepositoryStrategy, SlotStrategy,
    StrategyChain,
};
