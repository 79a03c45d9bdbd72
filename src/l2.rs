//! L2 framing adapter: builds distributed keys, frames/parses value
//! bytes, and downgrades every failure mode to a uniform status so the
//! coordinator never has to distinguish "connection error" from "bad
//! bytes" from "framing version mismatch".

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::entry::CacheEntry;
use crate::framing::{build_distributed_key, DistributedRecord};
use crate::metrics::{Family, MetricsSink, Operation, Status as MetricStatus};
use crate::traits::{L2RawStatus, L2Store, Serializer};

/// Sum-typed status returned to the coordinator. Deliberately not
/// conflating "Miss" with "found a record we couldn't decode" — the latter
/// is `Error`.
pub enum L2Status<V> {
    Hit(CacheEntry<V>),
    Miss,
    Error,
}

pub struct L2FramingAdapter<K, V> {
    store: Arc<dyn L2Store>,
    serializer: Arc<dyn Serializer<K, V>>,
    cache_name: String,
    key_prefix: String,
    metrics: Arc<dyn MetricsSink>,
}

impl<K, V> L2FramingAdapter<K, V> {
    pub fn new(
        store: Arc<dyn L2Store>,
        serializer: Arc<dyn Serializer<K, V>>,
        cache_name: String,
        key_prefix: String,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self { store, serializer, cache_name, key_prefix, metrics }
    }

    fn distributed_key(&self, stringified_key: &str) -> String {
        build_distributed_key(
            &self.key_prefix,
            &self.cache_name,
            self.serializer.schema_version(),
            stringified_key,
        )
    }

    pub async fn get(&self, stringified_key: &str) -> L2Status<V> {
        let dist_key = self.distributed_key(stringified_key);
        let (raw_status, bytes) = self.store.get(&dist_key).await;

        let status = match raw_status {
            L2RawStatus::Error => L2Status::Error,
            L2RawStatus::Miss => L2Status::Miss,
            L2RawStatus::Hit => match bytes {
                Some(bytes) => self.decode(&dist_key, bytes),
                None => {
                    tracing::warn!(cache_name = %self.cache_name, key = dist_key, "L2 reported Hit with no bytes");
                    L2Status::Error
                }
            },
        };

        let metric_status = match status {
            L2Status::Hit(_) => MetricStatus::Hit,
            L2Status::Miss => MetricStatus::Miss,
            L2Status::Error => MetricStatus::Error,
        };
        self.metrics.increment(
            Family::DistributedCacheRequests,
            &self.cache_name,
            Operation::Get,
            metric_status,
        );
        status
    }

    fn decode(&self, dist_key: &str, bytes: Vec<u8>) -> L2Status<V> {
        let record = match DistributedRecord::decode(bytes.into()) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(cache_name = %self.cache_name, key = dist_key, error = %err, "undecodable L2 record, leaving it in place");
                return L2Status::Error;
            }
        };

        if !record.has_value {
            return L2Status::Hit(CacheEntry::absent(record.creation_time, record.time_to_live));
        }

        match self.serializer.deserialize_value(&record.value_bytes) {
            Ok(value) => L2Status::Hit(CacheEntry::with_value(value, record.creation_time, record.time_to_live)),
            Err(err) => {
                tracing::warn!(cache_name = %self.cache_name, key = dist_key, error = %err, "L2 value failed to deserialize, leaving it in place");
                L2Status::Error
            }
        }
    }

    /// Write an entry down to L2. The byte TTL passed to the store equals
    /// `eviction_time - now`, not `time_to_live`: the stale region remains
    /// resident so peers can still serve it while the source recovers.
    pub async fn set(
        &self,
        stringified_key: &str,
        entry: &CacheEntry<V>,
        eviction_time: SystemTime,
    ) {
        let dist_key = self.distributed_key(stringified_key);

        let value_bytes = if entry.has_value() {
            match entry.value().map(|v| self.serializer.serialize_value(v)) {
                Some(Ok(bytes)) => bytes,
                Some(Err(err)) => {
                    tracing::warn!(cache_name = %self.cache_name, key = dist_key, error = %err, "serializer failed, skipping L2 write");
                    return;
                }
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        let record = DistributedRecord::new(
            entry.has_value(),
            value_bytes,
            entry.creation_time(),
            entry.time_to_live(),
        );

        let byte_ttl = eviction_time
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO);

        let ok = self.store.set(&dist_key, record.encode().to_vec(), byte_ttl).await;
        self.metrics.increment(
            Family::DistributedCacheRequests,
            &self.cache_name,
            Operation::Set,
            if ok { MetricStatus::Ok } else { MetricStatus::Error },
        );
        if !ok {
            tracing::warn!(cache_name = %self.cache_name, key = dist_key, "L2 write failed");
        }
    }

    pub async fn delete(&self, stringified_key: &str) -> bool {
        let dist_key = self.distributed_key(stringified_key);
        let ok = self.store.delete(&dist_key).await;
        self.metrics.increment(
            Family::DistributedCacheRequests,
            &self.cache_name,
            Operation::Del,
            if ok { MetricStatus::Ok } else { MetricStatus::Error },
        );
        ok
    }
}
