//! The coordinator: the state machine that executes `peek`, `get`, and
//! batched refresh across the L1 store, the L2 store, and the data source.

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::anyhow;
use futures_util::future::join_all;
use rand::Rng;
use tokio::sync::broadcast;

use crate::batcher::RefreshBatcher;
use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::l1::L1Adapter;
use crate::l2::{L2FramingAdapter, L2Status};
use crate::metrics::MetricsSink;
use crate::singleflight::{Role, SingleFlightRegistry};
use crate::source::{DataSourceAdapter, LoadOutcome};
use crate::traits::{DataSource, L1Store, L2Store, Serializer};

enum SourceOutcome<V> {
    Value(CacheEntry<V>),
    KeyMiss,
    LoadError,
}

/// Coordinates an L1 store, an L2 store, and a data source behind a single
/// `(K, V)`-typed cache. Construct via [`Coordinator::new`]; call
/// [`Coordinator::shutdown`] to stop the background refresh tick before
/// dropping.
pub struct Coordinator<K, V> {
    config: CacheConfig,
    l1: L1Adapter<V>,
    l2: Arc<L2FramingAdapter<K, V>>,
    source: DataSourceAdapter<K, V>,
    serializer: Arc<dyn Serializer<K, V>>,
    batcher: Arc<RefreshBatcher<K, V>>,
    single_flight: Arc<SingleFlightRegistry<V>>,
    shutdown: broadcast::Sender<()>,
}

impl<K, V> Coordinator<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Default + PartialEq + Send + Sync + 'static,
{
    pub fn new(
        config: CacheConfig,
        l1_store: Arc<dyn L1Store<V>>,
        l2_store: Arc<dyn L2Store>,
        source: Arc<dyn DataSource<K, V>>,
        serializer: Arc<dyn Serializer<K, V>>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Arc<Self> {
        let l1 = L1Adapter::new(l1_store, config.name().to_string(), metrics.clone());
        let l2 = Arc::new(L2FramingAdapter::new(
            l2_store,
            serializer.clone(),
            config.name().to_string(),
            config.key_prefix().to_string(),
            metrics.clone(),
        ));
        let source = DataSourceAdapter::new(source, config.name().to_string(), metrics.clone());
        let (shutdown, _) = broadcast::channel(1);

        let coordinator = Arc::new(Self {
            config,
            l1,
            l2,
            source,
            serializer,
            batcher: Arc::new(RefreshBatcher::new()),
            single_flight: SingleFlightRegistry::new(),
            shutdown,
        });

        coordinator.clone().spawn_refresh_tick();
        coordinator
    }

    fn spawn_refresh_tick(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown.subscribe();
        let tick = self.config.refresh_tick();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.flush_refresh_batch().await;
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!(cache_name = %self.config.name(), "refresh tick stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Stop the background refresh tick. The batcher's queued keys are
    /// dropped; in-flight `get`s are unaffected.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    async fn flush_refresh_batch(&self) {
        let pending = self.batcher.take_all();
        if pending.is_empty() {
            return;
        }
        let keys: Vec<K> = pending.keys().cloned().collect();
        tracing::debug!(cache_name = %self.config.name(), count = keys.len(), "flushing refresh batch");
        for chunk in keys.chunks(self.config.batch_size().max(1)) {
            self.refresh_batch(chunk).await;
        }
    }

    /// L1-only lookup. Never touches L2 or the source; never suspends on
    /// I/O. If the entry is missing or stale, enqueues it for background
    /// refresh before returning.
    pub async fn peek(&self, key: &K) -> Option<V> {
        let key_str = self.serializer.stringify_key(key);
        let now = SystemTime::now();
        let entry = self.l1.try_get(&key_str).await;

        if entry.is_none() || entry.as_ref().is_some_and(|e| e.is_stale(now)) {
            self.batcher.mark(key.clone(), entry.clone());
        }

        entry.filter(CacheEntry::has_value).and_then(|e| e.into_value())
    }

    /// Tier-descending lookup. Returns `(found, value)`; `value` is
    /// `V::default()` when not found.
    pub async fn get(&self, key: &K) -> (bool, V) {
        let key_str = self.serializer.stringify_key(key);
        let now = SystemTime::now();

        if let Some(entry) = self.l1.try_get(&key_str).await {
            if !entry.is_stale(now) {
                return (entry.has_value(), entry.value_or_default());
            }
        }

        match self.single_flight.enter(&key_str) {
            Role::Follower(mut rx) => match rx.recv().await {
                Ok(Some(entry)) => (entry.has_value(), entry.value_or_default()),
                Ok(None) | Err(_) => (false, V::default()),
            },
            Role::Leader(leader) => {
                // Another leader may have refreshed between our first read
                // and winning the registry slot.
                if let Some(entry) = self.l1.try_get(&key_str).await {
                    if !entry.is_stale(now) {
                        leader.resolve(Some(entry.clone()));
                        return (entry.has_value(), entry.value_or_default());
                    }
                }

                let resolved = self.refresh_one(key, &key_str, now).await;
                leader.resolve(resolved.clone());
                match resolved {
                    Some(entry) => (entry.has_value(), entry.value_or_default()),
                    None => (false, V::default()),
                }
            }
        }
    }

    /// Refresh decision graph for a single key. Invoked only from the
    /// single-flight leader path.
    async fn refresh_one(&self, key: &K, key_str: &str, now: SystemTime) -> Option<CacheEntry<V>> {
        let l1_entry = self.l1.try_get(key_str).await;
        let l2_status = self.l2.get(key_str).await;

        match l2_status {
            L2Status::Error => l1_entry,
            L2Status::Hit(l2_entry) if !l2_entry.is_stale(now) => {
                self.write_down_to_l1(key_str, &l2_entry, now).await;
                Some(l2_entry)
            }
            L2Status::Hit(l2_entry) => match self.consult_source(key, key_str, now).await {
                SourceOutcome::Value(new_entry) => Some(new_entry),
                SourceOutcome::KeyMiss => self.handle_key_miss(key_str, l1_entry.is_some(), now).await,
                SourceOutcome::LoadError => Some(l2_entry),
            },
            L2Status::Miss => match self.consult_source(key, key_str, now).await {
                SourceOutcome::Value(new_entry) => Some(new_entry),
                SourceOutcome::KeyMiss => self.handle_key_miss(key_str, l1_entry.is_some(), now).await,
                SourceOutcome::LoadError => l1_entry,
            },
        }
    }

    /// Bound a source load by `load_timeout`, so a hung source doesn't hang
    /// the caller forever. A timeout is reported the same as any other load
    /// error; the stream itself is dropped, cancelling its iterator.
    async fn load_with_timeout(&self, keys: &[K]) -> anyhow::Result<LoadOutcome<K, V>> {
        match tokio::time::timeout(self.config.load_timeout(), self.source.load(keys)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!(
                "data source load timed out after {:?}",
                self.config.load_timeout()
            )),
        }
    }

    async fn consult_source(&self, key: &K, key_str: &str, now: SystemTime) -> SourceOutcome<V> {
        let keys = [key.clone()];
        match self.load_with_timeout(&keys).await {
            Ok(outcome) => match outcome.records.into_iter().next() {
                Some(record) => {
                    let entry = CacheEntry::with_value(record.value, now, record.time_to_live);
                    self.write_through(key_str, &entry, now).await;
                    SourceOutcome::Value(entry)
                }
                None => SourceOutcome::KeyMiss,
            },
            Err(err) => {
                tracing::warn!(cache_name = %self.config.name(), key = key_str, error = %err, "data source load error, falling back");
                SourceOutcome::LoadError
            }
        }
    }

    async fn handle_key_miss(&self, key_str: &str, l1_existed: bool, now: SystemTime) -> Option<CacheEntry<V>> {
        if self.config.cache_data_source_misses() {
            let entry = CacheEntry::absent(now, self.config.time_to_live());
            self.write_through(key_str, &entry, now).await;
            Some(entry)
        } else {
            if l1_existed {
                self.l1.try_delete(key_str).await;
                self.l2.delete(key_str).await;
            }
            None
        }
    }

    /// Write a freshly sourced value to both tiers: full eviction horizon
    /// to L2 (spawned, so it doesn't extend caller latency), jittered TTL
    /// to L1 (awaited, in-process).
    async fn write_through(&self, key_str: &str, entry: &CacheEntry<V>, now: SystemTime) {
        self.write_down_to_l1(key_str, entry, now).await;

        let eviction_time = self.config.eviction_time_for(now, entry.time_to_live());
        let l2 = self.l2.clone();
        let key_owned = key_str.to_string();
        let entry_owned = entry.clone();
        tokio::spawn(async move {
            l2.set(&key_owned, &entry_owned, eviction_time).await;
        });
    }

    /// Apply TTL jitter and the equal-value extension, then store in L1.
    async fn write_down_to_l1(&self, key_str: &str, incoming: &CacheEntry<V>, now: SystemTime) {
        let jittered_ttl = jitter(incoming.time_to_live(), self.config.l1_jitter_fraction());
        let existing = self.l1.try_get(key_str).await;

        let to_store = match existing {
            Some(existing) if existing == *incoming => existing.retimed(now, jittered_ttl),
            _ => incoming.retimed(now, jittered_ttl),
        };
        self.l1.set(key_str, to_store).await;
    }

    /// Refresh a batch of keys in one pass: fan out L2 reads, serve fresh
    /// hits directly, and consult the source once for everything else
    /// (stale L2 hits and L2 misses — keys whose L2 read came back `Error`
    /// are excluded from the source request entirely, matching the
    /// single-key decision graph's "L2 error, skip source" rule).
    pub async fn refresh_batch(&self, keys: &[K]) {
        if keys.is_empty() {
            return;
        }
        let now = SystemTime::now();
        let key_strs: Vec<String> = keys.iter().map(|k| self.serializer.stringify_key(k)).collect();

        let l2_results = join_all(key_strs.iter().map(|ks| self.l2.get(ks))).await;

        let mut needs_source: Vec<K> = Vec::new();
        for ((key, key_str), status) in keys.iter().zip(key_strs.iter()).zip(l2_results) {
            match status {
                L2Status::Hit(entry) if !entry.is_stale(now) => {
                    self.write_down_to_l1(key_str, &entry, now).await;
                }
                L2Status::Hit(_) | L2Status::Miss => {
                    needs_source.push(key.clone());
                }
                L2Status::Error => {
                    // Source intentionally not consulted for this key.
                }
            }
        }

        if needs_source.is_empty() {
            return;
        }

        match self.load_with_timeout(&needs_source).await {
            Ok(outcome) => {
                for record in outcome.records {
                    let key_str = self.serializer.stringify_key(&record.key);
                    let entry = CacheEntry::with_value(record.value, now, record.time_to_live);
                    self.write_through(&key_str, &entry, now).await;
                }
                for missed_key in outcome.key_misses {
                    let key_str = self.serializer.stringify_key(&missed_key);
                    let l1_existed = self.l1.try_get(&key_str).await.is_some();
                    self.handle_key_miss(&key_str, l1_existed, now).await;
                }
            }
            Err(err) => {
                tracing::warn!(cache_name = %self.config.name(), error = %err, "bulk load error, batch left as-is");
            }
        }
    }

    /// Refresh an arbitrary number of keys, chunked to `batch_size` source
    /// loads each.
    pub async fn preload(&self, keys: &[K]) {
        for chunk in keys.chunks(self.config.batch_size().max(1)) {
            self.refresh_batch(chunk).await;
        }
    }
}

/// Subtract a uniformly random fraction of `ttl` in `[0, max_fraction)`,
/// rounded down to whole seconds.
fn jitter(ttl: Duration, max_fraction: f64) -> Duration {
    if max_fraction <= 0.0 {
        return ttl;
    }
    let fraction: f64 = rand::thread_rng().gen_range(0.0..max_fraction);
    let jitter_secs = (ttl.as_secs_f64() * fraction).floor() as u64;
    ttl.saturating_sub(Duration::from_secs(jitter_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_never_exceeds_the_bound() {
        let ttl = Duration::from_secs(1000);
        for _ in 0..200 {
            let jittered = jitter(ttl, 0.05);
            assert!(jittered <= ttl);
            assert!(jittered >= ttl - Duration::from_secs(50));
        }
    }

    #[test]
    fn zero_fraction_is_a_no_op() {
        let ttl = Duration::from_secs(1000);
        assert_eq!(jitter(ttl, 0.0), ttl);
    }
}
