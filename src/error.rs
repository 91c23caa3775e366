//! Error types for gridstore.
//!
//! Errors are strongly typed using thiserror. Most runtime conditions in the
//! storage network are not errors at all (a missing backend simply yields no
//! handler), so these enums stay small: configuration validation and grid
//! access.
//!
//! Contract violations of the announcement protocol are not represented here.
//! They panic, because they indicate a broken caller rather than a condition
//! anyone could recover from.

use thiserror::Error;

/// Validation errors raised by configuration setters and `validate()` methods.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Partition slot {index} is out of range (slots: {slots})")]
    PartitionSlotOutOfRange {
        index: usize,
        slots: usize,
    },

    #[error("Partition list has {actual} slots, at most {max} are supported")]
    PartitionTooLarge {
        actual: usize,
        max: usize,
    },

    #[error("{installed} upgrade cards installed, only {max} upgrade slots available")]
    TooManyUpgrades {
        installed: usize,
        max: usize,
    },

    #[error("Invalid tick rates: min ({min}) must be > 0 and <= max ({max})")]
    InvalidTickRates {
        min: u32,
        max: u32,
    },

    #[error("Event queue capacity must be > 0")]
    ZeroQueueCapacity,
}

/// Grid access errors.
///
/// These are returned by probes that need a live grid (posting events, asking
/// the tick manager to sleep or wake a node). Callers in this crate skip the
/// dependent action when they see one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("Grid is not available")]
    GridUnavailable,

    #[error("Grid node is not active")]
    NodeInactive,

    #[error("No tick manager is attached")]
    NoTickManager,
}

/// Top-level error type for gridstore.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
}

impl StoreError {
    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a grid access error.
    #[must_use]
    pub const fn is_grid(&self) -> bool {
        matches!(self, Self::Grid(_))
    }
}

/// Result type alias for gridstore operations.
pub type StoreResult<T> = Result<T, StoreError>;
