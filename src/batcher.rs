//! Refresh batcher: accumulates keys that `peek` judged stale or
//! absent, and periodically flushes them for background refresh.
//!
//! Uses a mutex-guarded map rather than `DashMap` so the flush can take the
//! whole map out atomically via `mem::take` — a sharded map would need a
//! coordinated sweep across shards to get the same atomicity.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use crate::entry::CacheEntry;

pub struct RefreshBatcher<K, V> {
    pending: Mutex<HashMap<K, Option<CacheEntry<V>>>>,
}

impl<K, V> Default for RefreshBatcher<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self { pending: Mutex::new(HashMap::new()) }
    }
}

impl<K, V> RefreshBatcher<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a key as needing refresh, carrying whatever entry (if any) was
    /// seen when the staleness was detected. Duplicate signals for the same
    /// key coalesce naturally since the map is keyed by `K`.
    pub fn mark(&self, key: K, prior_entry: Option<CacheEntry<V>>) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.insert(key, prior_entry);
    }

    /// Atomically swap out the accumulated map for an empty one.
    pub fn take_all(&self) -> HashMap<K, Option<CacheEntry<V>>> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *pending)
    }

    pub fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn duplicate_marks_coalesce() {
        let batcher: RefreshBatcher<String, i32> = RefreshBatcher::new();
        batcher.mark("a".to_string(), None);
        batcher.mark(
            "a".to_string(),
            Some(CacheEntry::with_value(1, SystemTime::now(), Duration::from_secs(1))),
        );
        assert_eq!(batcher.len(), 1);
    }

    #[test]
    fn take_all_empties_the_map() {
        let batcher: RefreshBatcher<String, i32> = RefreshBatcher::new();
        batcher.mark("a".to_string(), None);
        batcher.mark("b".to_string(), None);

        let taken = batcher.take_all();
        assert_eq!(taken.len(), 2);
        assert!(batcher.is_empty());
    }
}
