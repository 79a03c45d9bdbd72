//! L1 adapter: a thin, instrumented wrapper over the caller's
//! [`L1Store`](crate::traits::L1Store).
//!
//! The contract says the underlying store must never panic; this adapter
//! still treats a panic as a miss rather than letting it unwind into the
//! coordinator, via `catch_unwind` around the future. A defective
//! implementation degrades to "always empty" instead of taking the
//! process down.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use crate::entry::CacheEntry;
use crate::metrics::{Family, MetricsSink, Operation, Status};
use crate::traits::L1Store;

pub struct L1Adapter<V> {
    store: Arc<dyn L1Store<V>>,
    cache_name: String,
    metrics: Arc<dyn MetricsSink>,
}

impl<V> L1Adapter<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn L1Store<V>>, cache_name: String, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { store, cache_name, metrics }
    }

    pub async fn try_get(&self, key: &str) -> Option<CacheEntry<V>> {
        let result = AssertUnwindSafe(self.store.try_get(key)).catch_unwind().await;
        let entry = match result {
            Ok(entry) => entry,
            Err(_) => {
                tracing::error!(cache_name = %self.cache_name, key, "L1 store panicked on get, treating as miss");
                None
            }
        };
        let status = if entry.is_some() { Status::Hit } else { Status::Miss };
        self.metrics
            .increment(Family::LocalCacheRequests, &self.cache_name, Operation::Get, status);
        tracing::trace!(cache_name = %self.cache_name, key, hit = entry.is_some(), "l1 get");
        entry
    }

    pub async fn set(&self, key: &str, entry: CacheEntry<V>) {
        let result = AssertUnwindSafe(self.store.set(key, entry)).catch_unwind().await;
        if result.is_err() {
            tracing::error!(cache_name = %self.cache_name, key, "L1 store panicked on set");
        }
        self.metrics
            .increment(Family::LocalCacheRequests, &self.cache_name, Operation::Set, Status::Ok);
        tracing::trace!(cache_name = %self.cache_name, key, "l1 set");
    }

    pub async fn try_delete(&self, key: &str) -> bool {
        let result = AssertUnwindSafe(self.store.try_delete(key)).catch_unwind().await;
        let deleted = result.unwrap_or(false);
        self.metrics
            .increment(Family::LocalCacheRequests, &self.cache_name, Operation::Del, Status::Ok);
        tracing::trace!(cache_name = %self.cache_name, key, deleted, "l1 delete");
        deleted
    }

    pub async fn count(&self) -> u64 {
        let count = self.store.count().await;
        self.metrics.set_gauge(&self.cache_name, count);
        count
    }
}
