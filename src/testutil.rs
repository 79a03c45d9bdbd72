//! In-memory stand-ins for the external traits, so the coordination core's
//! own tests don't need a real L1/L2/data-source backend running.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::entry::CacheEntry;
use crate::traits::{DataSource, L1Store, L2RawStatus, L2Store, Serializer, SourceRecord, SourceStream};

/// In-memory L1 store. Entries are stored verbatim; staleness is the
/// coordinator's concern, not this store's.
#[derive(Default)]
pub struct InMemoryL1Store<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V> InMemoryL1Store<V> {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }
}

#[async_trait]
impl<V: Clone + Send + Sync> L1Store<V> for InMemoryL1Store<V> {
    async fn try_get(&self, key: &str) -> Option<CacheEntry<V>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).get(key).cloned()
    }

    async fn set(&self, key: &str, entry: CacheEntry<V>) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), entry);
    }

    async fn try_delete(&self, key: &str) -> bool {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).remove(key).is_some()
    }

    async fn count(&self) -> u64 {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len() as u64
    }
}

/// In-memory byte-level L2 store. A key can be forced to always report
/// `Error` (simulating a downed backend) via [`InMemoryL2Store::force_error`].
#[derive(Default)]
pub struct InMemoryL2Store {
    bytes: Mutex<HashMap<String, Vec<u8>>>,
    error_keys: Mutex<std::collections::HashSet<String>>,
}

impl InMemoryL2Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subsequent `get`/`set`/`delete` calls against this key report
    /// `Error` instead of touching the underlying map, simulating a
    /// transport failure.
    pub fn force_error(&self, key: &str) {
        self.error_keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string());
    }
}

#[async_trait]
impl L2Store for InMemoryL2Store {
    async fn get(&self, key: &str) -> (L2RawStatus, Option<Vec<u8>>) {
        if self.error_keys.lock().unwrap_or_else(|e| e.into_inner()).contains(key) {
            return (L2RawStatus::Error, None);
        }
        match self.bytes.lock().unwrap_or_else(|e| e.into_inner()).get(key) {
            Some(bytes) => (L2RawStatus::Hit, Some(bytes.clone())),
            None => (L2RawStatus::Miss, None),
        }
    }

    async fn set(&self, key: &str, bytes: Vec<u8>, _ttl: Duration) -> bool {
        if self.error_keys.lock().unwrap_or_else(|e| e.into_inner()).contains(key) {
            return false;
        }
        self.bytes.lock().unwrap_or_else(|e| e.into_inner()).insert(key.to_string(), bytes);
        true
    }

    async fn delete(&self, key: &str) -> bool {
        if self.error_keys.lock().unwrap_or_else(|e| e.into_inner()).contains(key) {
            return false;
        }
        self.bytes.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        true
    }
}

/// `serde_json`-backed serializer for simple test key/value types.
#[derive(Debug)]
pub struct JsonSerializer {
    schema_version: u32,
}

impl JsonSerializer {
    pub fn new(schema_version: u32) -> Self {
        Self { schema_version }
    }
}

impl<K: fmt::Display, V: Serialize + DeserializeOwned> Serializer<K, V> for JsonSerializer {
    fn schema_version(&self) -> u32 {
        self.schema_version
    }

    fn stringify_key(&self, key: &K) -> String {
        key.to_string()
    }

    fn serialize_value(&self, value: &V) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize_value(&self, bytes: &[u8]) -> anyhow::Result<V> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// An upstream source backed by a fixed seed map. Calls are recorded so
/// tests can assert on what was actually requested (a single-flight test
/// wants to see exactly one load for a stampede of concurrent `get`s).
pub struct InMemoryDataSource<K, V> {
    seed: Mutex<HashMap<K, (V, Duration)>>,
    calls: Mutex<Vec<Vec<K>>>,
    fail_next: Mutex<bool>,
}

impl<K: Eq + std::hash::Hash + Clone, V: Clone> InMemoryDataSource<K, V> {
    pub fn new(seed: HashMap<K, (V, Duration)>) -> Self {
        Self { seed: Mutex::new(seed), calls: Mutex::new(Vec::new()), fail_next: Mutex::new(false) }
    }

    /// The next call to `load` returns `Err` instead of a stream.
    pub fn fail_next_load(&self) {
        *self.fail_next.lock().unwrap_or_else(|e| e.into_inner()) = true;
    }

    /// Change what `load` returns for `key`, taking effect on the next call.
    pub fn set_seed(&self, key: K, value: V, ttl: Duration) {
        self.seed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, (value, ttl));
    }

    /// Remove a key from the seed so the next `load` reports it as a key
    /// miss.
    pub fn remove_seed(&self, key: &K) {
        self.seed.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
    }

    pub fn calls(&self) -> Vec<Vec<K>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl<K, V> DataSource<K, V> for InMemoryDataSource<K, V>
where
    K: Eq + std::hash::Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn load<'a>(&'a self, keys: &'a [K]) -> anyhow::Result<SourceStream<'a, K, V>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(keys.to_vec());

        let mut fail_next = self.fail_next.lock().unwrap_or_else(|e| e.into_inner());
        if *fail_next {
            *fail_next = false;
            anyhow::bail!("simulated load error");
        }
        drop(fail_next);

        let seed = self.seed.lock().unwrap_or_else(|e| e.into_inner());
        let records: Vec<anyhow::Result<SourceRecord<K, V>>> = keys
            .iter()
            .filter_map(|k| seed.get(k).map(|(v, ttl)| (k.clone(), v.clone(), *ttl)))
            .map(|(key, value, time_to_live)| Ok(SourceRecord { key, value, time_to_live }))
            .collect();
        drop(seed);

        Ok(Box::pin(futures_util::stream::iter(records)))
    }
}
