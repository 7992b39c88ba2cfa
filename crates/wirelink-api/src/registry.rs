//! Handle registries.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Process-wide handle counter, shared across every registry so a handle
/// value is never reused for a different object type.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// One locked map per object type. Handles are opaque and monotonically
/// assigned; a released handle is never handed out again.
pub(crate) struct Registry<T> {
    items: Mutex<BTreeMap<u64, Arc<T>>>,
}

impl<T> Registry<T> {
    pub(crate) const fn new() -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn insert(&self, value: Arc<T>) -> u64 {
        let handle = NEXT_HANDLE.fetch_add(1, Ordering::SeqCst);
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.insert(handle, value);
        handle
    }

    pub(crate) fn get(&self, handle: u64) -> Option<Arc<T>> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.get(&handle).cloned()
    }

    pub(crate) fn remove(&self, handle: u64) -> Option<Arc<T>> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.remove(&handle)
    }
}
