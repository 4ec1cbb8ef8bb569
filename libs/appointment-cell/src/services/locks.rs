use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::slots::TimeSlot;

type SlotKey = (Uuid, NaiveDate, TimeSlot);

/// Serializes check-and-write sequences per slot key. Two concurrent booking
/// attempts for the same `(doctor, date, slot)` queue here, so the loser sees
/// the winner's row when it re-runs the conflict check.
pub struct SlotLockRegistry {
    locks: Mutex<HashMap<SlotKey, Arc<AsyncMutex<()>>>>,
}

impl SlotLockRegistry {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the lock for a slot key. The guard is released on drop, on
    /// every exit path of the caller.
    pub async fn acquire(&self, doctor_id: Uuid, date: NaiveDate, slot: TimeSlot) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().unwrap();
            // Entries held only by the map have no waiters; drop them so the
            // registry stays bounded by the set of contended keys.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry((doctor_id, date, slot))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }
}

impl Default for SlotLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}
