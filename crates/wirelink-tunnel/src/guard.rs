//! One-shot teardown flag.

use std::sync::atomic::{AtomicBool, Ordering};

/// Atomic test-and-set guarding teardown so it runs at most once no matter
/// which failure path reaches it first.
#[derive(Debug, Default)]
pub struct TeardownGuard {
    fin: AtomicBool,
}

impl TeardownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once, on the first call.
    pub fn arm(&self) -> bool {
        !self.fin.swap(true, Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.fin.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arms_exactly_once() {
        let guard = TeardownGuard::new();
        assert!(!guard.is_finished());
        assert!(guard.arm());
        assert!(guard.is_finished());
        assert!(!guard.arm());
        assert!(!guard.arm());
    }
}
