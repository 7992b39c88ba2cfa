//! Dual-readiness gate for tunnels whose two sides hand-shake concurrently.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

/// Relay may only start once both the inbound and the outbound side are
/// established. Signaling an already-signaled side is a no-op, and the gate
/// fires exactly once.
#[derive(Debug, Default)]
pub struct EstablishGate {
    local: AtomicBool,
    remote: AtomicBool,
    fired: AtomicBool,
}

impl EstablishGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks one side ready. Returns `true` only for the signal that
    /// completes the pair.
    pub fn signal(&self, side: Side) -> bool {
        match side {
            Side::Local => self.local.store(true, Ordering::SeqCst),
            Side::Remote => self.remote.store(true, Ordering::SeqCst),
        }
        if self.local.load(Ordering::SeqCst) && self.remote.load(Ordering::SeqCst) {
            !self.fired.swap(true, Ordering::SeqCst)
        } else {
            false
        }
    }

    pub fn is_ready(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}
