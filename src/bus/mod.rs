//! Storage bus: configuration, grid link and the bus itself.

mod config;
mod link;
mod part;

pub use config::{
    BusConfig, Upgrades, BASE_PARTITION_SLOTS, PARTITION_SLOTS, SLOTS_PER_CAPACITY_CARD, UPGRADE_SLOTS,
};
pub use link::{GridLink, TickManager};
pub use part::{BindingState, HandlerCacheEntry, ResetKind, StorageBus};
