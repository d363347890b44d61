use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily-allocated per-key mutexes.
///
/// The settlement orchestrator and the payout service share one map keyed
/// by teacher id, so a credit and a payout reservation for the same account
/// serialize; ledger entry transitions use a second map keyed by
/// transaction id. Lock entries are never reclaimed; the key space is
/// bounded by the number of teachers and transactions seen by one process.
#[derive(Default)]
pub struct KeyedLocks<K> {
    inner: Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub async fn acquire(&self, key: K) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(key).or_default())
        };
        slot.lock_owned().await
    }
}
