//! Shared settings vocabulary.
//!
//! Small enums used across the storage network: operation modes, access
//! restrictions, filter modes, fuzzy tolerances and tick modulation. They are
//! serializable because they end up inside persisted consumer configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Whether an operation commits or only simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actionable {
    /// Dry run: no mutation, no notification.
    Simulate,
    /// Commit the mutation and announce the resulting delta.
    Modulate,
}

impl Actionable {
    /// Returns true for [`Actionable::Simulate`].
    #[must_use]
    pub const fn is_simulate(self) -> bool {
        matches!(self, Self::Simulate)
    }
}

/// Read/write permissions of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRestriction {
    NoAccess,
    Read,
    Write,
    ReadWrite,
}

impl AccessRestriction {
    const fn bits(self) -> u8 {
        match self {
            Self::NoAccess => 0,
            Self::Read => 1,
            Self::Write => 2,
            Self::ReadWrite => 3,
        }
    }

    const fn from_bits(bits: u8) -> Self {
        match bits & 3 {
            1 => Self::Read,
            2 => Self::Write,
            3 => Self::ReadWrite,
            _ => Self::NoAccess,
        }
    }

    /// Returns true if every permission in `other` is granted by `self`.
    #[must_use]
    pub const fn has_permission(self, other: Self) -> bool {
        self.bits() & other.bits() == other.bits()
    }

    /// Intersection of both restrictions.
    #[must_use]
    pub const fn restrict(self, other: Self) -> Self {
        Self::from_bits(self.bits() & other.bits())
    }

    #[must_use]
    pub const fn can_read(self) -> bool {
        self.has_permission(Self::Read)
    }

    #[must_use]
    pub const fn can_write(self) -> bool {
        self.has_permission(Self::Write)
    }
}

impl Default for AccessRestriction {
    fn default() -> Self {
        Self::ReadWrite
    }
}

impl fmt::Display for AccessRestriction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAccess => write!(f, "no_access"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::ReadWrite => write!(f, "read_write"),
        }
    }
}

/// Which backend slots a polling adapter reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageFilter {
    /// Report every slot.
    AllItems,
    /// Skip slots the backend refuses to extract from.
    ExtractableOnly,
}

impl Default for StorageFilter {
    fn default() -> Self {
        Self::ExtractableOnly
    }
}

/// Wear tolerance used by fuzzy partition matching.
///
/// The percentage is the share of maximum wear at which the break point sits;
/// two worn resources match when they fall on the same side of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzyMode {
    /// Any amount of wear matches.
    IgnoreAll,
    /// Undamaged vs. damaged.
    Percent99,
    Percent75,
    Percent50,
    Percent25,
}

impl FuzzyMode {
    /// Wear percentage of the break point, `None` for [`FuzzyMode::IgnoreAll`].
    #[must_use]
    pub const fn percentage(self) -> Option<u32> {
        match self {
            Self::IgnoreAll => None,
            Self::Percent99 => Some(0),
            Self::Percent75 => Some(25),
            Self::Percent50 => Some(50),
            Self::Percent25 => Some(75),
        }
    }

    /// Absolute wear break point for a resource with `max_damage`.
    #[must_use]
    pub fn break_point(self, max_damage: u32) -> Option<u32> {
        self.percentage()
            .map(|p| u32::try_from(u64::from(p) * u64::from(max_damage) / 100).unwrap_or(u32::MAX))
    }
}

impl Default for FuzzyMode {
    fn default() -> Self {
        Self::IgnoreAll
    }
}

/// Whether a partition list allows or denies what it lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeExclude {
    Whitelist,
    Blacklist,
}

impl Default for IncludeExclude {
    fn default() -> Self {
        Self::Whitelist
    }
}

/// Tick-rate request returned by every ticking component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickRateModulation {
    /// Tick at the slowest rate.
    Idle,
    /// Back off a little.
    Slower,
    /// Keep the current rate.
    SameSpeed,
    /// Speed up a little.
    Faster,
    /// Tick at the fastest rate.
    Urgent,
    /// Stop ticking until woken or alerted.
    Sleep,
}

/// Tick interval bounds, in scheduler ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRates {
    /// Fastest interval.
    pub min: u32,
    /// Slowest interval.
    pub max: u32,
}

impl TickRates {
    /// Storage bus defaults.
    pub const STORAGE_BUS: Self = Self { min: 5, max: 60 };

    /// Validate the bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min == 0 || self.min > self.max {
            return Err(ConfigError::InvalidTickRates {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl Default for TickRates {
    fn default() -> Self {
        Self::STORAGE_BUS
    }
}

/// Registration request handed to the external tick scheduler.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickingRequest {
    pub rates: TickRates,
    pub is_sleeping: bool,
    pub can_be_alerted: bool,
}
