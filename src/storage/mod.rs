//! Storage layer for gridstore.
//!
//! Backend contracts, the handler that applies access/priority/partition rules
//! to a backend, the network-wide priority composite, and in-memory reference
//! backends.

mod handler;
mod memory;
mod network;
mod traits;

pub use handler::{HandlerId, InventoryHandler, PartitionList};
pub use memory::{MemoryRepository, SlotInventory};
pub use network::NetworkInventory;
pub use traits::{
    BackendId, Inventory, ItemRepository, NativeStorage, SlotBackend, StorageAccessor, StorageTarget,
};
