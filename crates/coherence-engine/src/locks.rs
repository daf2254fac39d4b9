//! Per-record mutual exclusion
//!
//! Every mutation of a (participant, component) pair runs under that pair's
//! lock, held across the read-modify-write including the store round trips.
//! The engine never holds two record locks at once.
//!
//! A slot lives only while some task holds or waits on it, so the map stays
//! bounded by the number of pairs in flight.

use coherence_core::RecordKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slots = Arc<Mutex<HashMap<RecordKey, Arc<AsyncMutex<()>>>>>;

#[derive(Debug, Default)]
pub(crate) struct RecordLocks {
    slots: Slots,
}

impl RecordLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one pair
    pub(crate) async fn acquire(&self, key: &RecordKey) -> RecordGuard {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        RecordGuard {
            guard: Some(slot.lock_owned().await),
            slots: Arc::clone(&self.slots),
            key: key.clone(),
        }
    }

    /// Number of live slots
    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

/// Held access to one pair; releasing it drops the slot when nobody waits
pub(crate) struct RecordGuard {
    guard: Option<OwnedMutexGuard<()>>,
    slots: Slots,
    key: RecordKey,
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.slots.lock();
        // Clones are only taken under this map lock, so a count of one means
        // no other task holds or waits on the slot.
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
    }
}
