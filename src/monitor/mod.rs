//! Change notification for networked storage.
//!
//! A [`NetworkMonitor`] wraps one channel's network inventory, keeps a cached
//! snapshot and running totals, and announces net deltas to listeners and to
//! an interest registry. Announcements are guarded by a [`NotifyContext`]
//! passed down the call chain instead of global state.

/// Announcing stack threaded through mutating calls.
pub mod context;
/// Grid totals and the coarse event queue.
pub mod grid;
/// Per-identity watchers.
pub mod interest;
/// Listener registrations.
pub mod listener;
/// The network monitor itself.
pub mod network;

pub use context::{NotifyContext, CONTRACT_VIOLATION};
pub use grid::{GridEvent, GridEventConfig, GridEventKind, GridStorage};
pub use interest::{InterestManager, InterestRegistry, StackWatcherHost};
pub use listener::{ListenerRegistry, ListenerToken, MonitorListener, Observable};
pub use network::{MonitorId, NetworkMonitor};
