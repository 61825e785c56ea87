// libs/appointment-cell/src/services/locks.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type PairMap = HashMap<(i64, i64), Arc<AsyncMutex<()>>>;

/// One async mutex per (doctor_id, clinic_id). Holding the guard across a
/// conflict check and the following write serialises writers of the same
/// pair inside this process. An entry lives only while someone holds or
/// waits for it.
#[derive(Default)]
pub struct SchedulingLocks {
    pairs: Arc<Mutex<PairMap>>,
}

/// Exclusive hold on one pair. Dropping the last interest in the pair removes
/// its entry from the registry.
pub struct PairGuard {
    key: (i64, i64),
    pairs: Arc<Mutex<PairMap>>,
    guard: OwnedMutexGuard<()>,
}

// A poisoned map is still consistent.
fn lock_map(pairs: &Mutex<PairMap>) -> MutexGuard<'_, PairMap> {
    pairs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SchedulingLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, doctor_id: i64, clinic_id: i64) -> PairGuard {
        let key = (doctor_id, clinic_id);
        let lock = lock_map(&self.pairs)
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();

        PairGuard {
            key,
            pairs: self.pairs.clone(),
            guard: lock.lock_owned().await,
        }
    }

    pub fn tracked_pairs(&self) -> usize {
        lock_map(&self.pairs).len()
    }
}

impl Drop for PairGuard {
    fn drop(&mut self) {
        let mut pairs = lock_map(&self.pairs);
        let held = OwnedMutexGuard::mutex(&self.guard);
        // Two references left: the registry entry and this guard.
        let idle = pairs
            .get(&self.key)
            .is_some_and(|entry| Arc::ptr_eq(entry, held) && Arc::strong_count(entry) == 2);
        if idle {
            pairs.remove(&self.key);
        }
    }
}
