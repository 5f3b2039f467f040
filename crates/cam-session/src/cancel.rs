//! Cancellation primitive for a blocked collection.
//!
//! `abort` must be safe to invoke from a different control path than the
//! one executing `collect` (an external abort arriving while collection is
//! blocked on hardware). The handle is a cloneable atomic flag; the
//! collect loop observes it between polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation flag shared with a running collection.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent; never blocks.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// True once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clear the flag for a new epoch.
    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_sticky_until_reset() {
        let handle = CancelHandle::new();
        assert!(!handle.is_cancelled());

        let other = handle.clone();
        other.cancel();
        other.cancel();
        assert!(handle.is_cancelled());

        handle.reset();
        assert!(!handle.is_cancelled());
    }
}
