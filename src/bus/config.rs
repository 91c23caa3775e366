//! Storage bus configuration.
//!
//! Persisted by the consumer in whatever format it likes; the crate only
//! guarantees a serde representation and validation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::settings::{AccessRestriction, FuzzyMode, IncludeExclude, StorageFilter};
use crate::stack::ResourceKey;
use crate::storage::PartitionList;

/// Total partition slots a bus exposes.
pub const PARTITION_SLOTS: usize = 63;
/// Slots usable without capacity cards.
pub const BASE_PARTITION_SLOTS: usize = 18;
/// Slots unlocked by each capacity card.
pub const SLOTS_PER_CAPACITY_CARD: usize = 9;
/// Upgrade card slots.
pub const UPGRADE_SLOTS: usize = 5;

/// Installed upgrade cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upgrades {
    /// Capacity cards, each unlocking one more row of partition slots.
    pub capacity: u8,
    /// Switches the partition list to fuzzy matching.
    pub fuzzy: bool,
    /// Turns the partition list into a blacklist.
    pub inverter: bool,
}

impl Upgrades {
    /// Number of installed cards.
    #[must_use]
    pub fn installed(&self) -> usize {
        usize::from(self.capacity) + usize::from(self.fuzzy) + usize::from(self.inverter)
    }
}

/// User-editable settings of one storage bus.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig<K> {
    pub priority: i32,
    pub access: AccessRestriction,
    pub storage_filter: StorageFilter,
    pub fuzzy_mode: FuzzyMode,
    /// Partition slots; `None` is an empty slot.
    pub partition: Vec<Option<K>>,
    pub upgrades: Upgrades,
}

impl<K: ResourceKey> Default for BusConfig<K> {
    fn default() -> Self {
        Self {
            priority: 0,
            access: AccessRestriction::ReadWrite,
            storage_filter: StorageFilter::ExtractableOnly,
            fuzzy_mode: FuzzyMode::IgnoreAll,
            partition: vec![None; PARTITION_SLOTS],
            upgrades: Upgrades::default(),
        }
    }
}

impl<K: ResourceKey> BusConfig<K> {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partition.len() > PARTITION_SLOTS {
            return Err(ConfigError::PartitionTooLarge {
                actual: self.partition.len(),
                max: PARTITION_SLOTS,
            });
        }
        if self.upgrades.installed() > UPGRADE_SLOTS {
            return Err(ConfigError::TooManyUpgrades {
                installed: self.upgrades.installed(),
                max: UPGRADE_SLOTS,
            });
        }
        Ok(())
    }

    /// Partition slots unlocked by the installed capacity cards.
    #[must_use]
    pub fn active_slots(&self) -> usize {
        (BASE_PARTITION_SLOTS + SLOTS_PER_CAPACITY_CARD * usize::from(self.upgrades.capacity)).min(PARTITION_SLOTS)
    }

    /// Sets one partition slot, growing the slot vector if needed.
    pub fn set_partition_slot(&mut self, index: usize, key: Option<K>) -> Result<(), ConfigError> {
        if index >= PARTITION_SLOTS {
            return Err(ConfigError::PartitionSlotOutOfRange {
                index,
                slots: PARTITION_SLOTS,
            });
        }
        if self.partition.len() <= index {
            self.partition.resize(index + 1, None);
        }
        self.partition[index] = key;
        Ok(())
    }

    /// The partition list built from the unlocked slots.
    #[must_use]
    pub fn partition_list(&self) -> PartitionList<K> {
        let keys = self
            .partition
            .iter()
            .take(self.active_slots())
            .flatten()
            .cloned();
        if self.upgrades.fuzzy {
            PartitionList::Fuzzy {
                keys: keys.collect(),
                mode: self.fuzzy_mode,
            }
        } else {
            PartitionList::Precise(keys.collect::<BTreeSet<_>>())
        }
    }

    #[must_use]
    pub fn include_exclude(&self) -> IncludeExclude {
        if self.upgrades.inverter {
            IncludeExclude::Blacklist
        } else {
            IncludeExclude::Whitelist
        }
    }
}
