// libs/appointment-cell/src/services/consistency.rs
//
// Per-slot serialization of the capacity check and insert. The store has no
// transactions, so two bookings for the same slot in this process queue on a
// shared async mutex. Writers in other processes are not covered.
//

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::models::TimeBucket;

#[derive(Clone, Default)]
pub struct SlotLocks {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SlotLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to one (date, time) slot.
    pub async fn acquire(&self, date: NaiveDate, time: TimeBucket) -> OwnedMutexGuard<()> {
        let lock_key = generate_lock_key(date, time);

        let slot_lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody is holding or waiting on.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(lock_key.clone()).or_default().clone()
        };

        debug!("Waiting for scheduling lock {}", lock_key);
        let guard = slot_lock.lock_owned().await;
        debug!("Scheduling lock acquired: {}", lock_key);
        guard
    }

    pub fn tracked_slots(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}

pub fn generate_lock_key(date: NaiveDate, time: TimeBucket) -> String {
    format!("slot_{}_{}", date, time.label())
}
