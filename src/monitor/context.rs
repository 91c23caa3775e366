//! Notification context threaded through every mutating call.

use super::network::MonitorId;

/// Panic message prefix for announcement contract violations.
pub const CONTRACT_VIOLATION: &str = "invalid access to networked storage";

/// Tracks which monitors are currently announcing.
///
/// One context is created per top-level tick (or per external call into the
/// network) and passed by `&mut` down the whole call chain, including into
/// listener callbacks. A monitor entering while it is already on the stack, or
/// leaving out of order, is a broken caller and panics.
#[derive(Debug, Default)]
pub struct NotifyContext {
    announcing: Vec<MonitorId>,
}

impl NotifyContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `monitor` is somewhere on the announcing stack.
    #[must_use]
    pub fn is_announcing(&self, monitor: MonitorId) -> bool {
        self.announcing.contains(&monitor)
    }

    /// Number of announcements in flight.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.announcing.len()
    }

    /// Pushes `monitor`.
    ///
    /// # Panics
    /// If `monitor` is already announcing.
    pub fn enter(&mut self, monitor: MonitorId) {
        assert!(
            !self.is_announcing(monitor),
            "{CONTRACT_VIOLATION}: monitor {monitor} re-entered its own announcement"
        );
        self.announcing.push(monitor);
    }

    /// Pops `monitor`.
    ///
    /// # Panics
    /// If the top of the stack is not `monitor`.
    pub fn leave(&mut self, monitor: MonitorId) {
        let top = self.announcing.pop();
        assert!(
            top == Some(monitor),
            "{CONTRACT_VIOLATION}: expected {monitor} on top of the announcing stack, found {top:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_distinct_monitors_are_allowed() {
        let a = MonitorId::new();
        let b = MonitorId::new();
        let mut ctx = NotifyContext::new();
        ctx.enter(a);
        ctx.enter(b);
        assert_eq!(ctx.depth(), 2);
        assert!(ctx.is_announcing(a));
        ctx.leave(b);
        ctx.leave(a);
        assert_eq!(ctx.depth(), 0);
    }

    #[test]
    #[should_panic(expected = "invalid access to networked storage")]
    fn reentry_panics() {
        let a = MonitorId::new();
        let mut ctx = NotifyContext::new();
        ctx.enter(a);
        ctx.enter(a);
    }

    #[test]
    #[should_panic(expected = "invalid access to networked storage")]
    fn mismatched_leave_panics() {
        let mut ctx = NotifyContext::new();
        ctx.enter(MonitorId::new());
        ctx.leave(MonitorId::new());
    }
}
