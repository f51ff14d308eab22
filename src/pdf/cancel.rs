//! Pass tracking for cooperative cancellation of rasterization passes
//!
//! Every load or rescale starts a new pass. Starting a pass makes all
//! earlier passes stale; the worker checks after each suspension point and
//! abandons stale work, and the session drops stale responses.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a rasterization pass
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub u64);

/// Shared counter of the newest pass.
///
/// Clones observe the same state, so the session and its worker can hold
/// one each.
#[derive(Clone, Debug, Default)]
pub struct PassTracker {
    current: Arc<AtomicU64>,
}

impl PassTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new pass, superseding every earlier one
    pub fn begin(&self) -> PassId {
        PassId(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// The newest pass, if any was started
    #[must_use]
    pub fn current(&self) -> Option<PassId> {
        match self.current.load(Ordering::Acquire) {
            0 => None,
            id => Some(PassId(id)),
        }
    }

    /// Whether `pass` is still the newest pass
    #[must_use]
    pub fn is_current(&self, pass: PassId) -> bool {
        self.current.load(Ordering::Acquire) == pass.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pass_before_begin() {
        let tracker = PassTracker::new();
        assert_eq!(tracker.current(), None);
    }

    #[test]
    fn begin_supersedes_previous_pass() {
        let tracker = PassTracker::new();
        let first = tracker.begin();
        assert!(tracker.is_current(first));

        let second = tracker.begin();
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
        assert!(second > first);
    }

    #[test]
    fn clones_share_state() {
        let tracker = PassTracker::new();
        let worker_view = tracker.clone();
        let pass = tracker.begin();
        assert!(worker_view.is_current(pass));
        tracker.begin();
        assert!(!worker_view.is_current(pass));
    }
}
