//! Data-source adapter: iterates upstream results, validates them,
//! and counts outcomes.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use futures_util::StreamExt;

use crate::metrics::{Family, MetricsSink, Operation, Status};
use crate::traits::{DataSource, SourceRecord};

pub struct DataSourceAdapter<K, V> {
    source: Arc<dyn DataSource<K, V>>,
    cache_name: String,
    metrics: Arc<dyn MetricsSink>,
}

/// The outcome of loading one batch of keys: records actually produced by
/// the source, plus which requested keys never showed up (key misses).
pub struct LoadOutcome<K, V> {
    pub records: Vec<SourceRecord<K, V>>,
    pub key_misses: Vec<K>,
}

impl<K, V> DataSourceAdapter<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(source: Arc<dyn DataSource<K, V>>, cache_name: String, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { source, cache_name, metrics }
    }

    /// Load the given keys, validating every emitted record. A single
    /// failure to open the stream is a fatal load error and propagates;
    /// per-record failures (null key, key outside the request set,
    /// negative TTL, mid-stream errors) are counted and dropped, and
    /// iteration continues.
    pub async fn load(&self, keys: &[K]) -> anyhow::Result<LoadOutcome<K, V>> {
        let requested: HashSet<K> = keys.iter().cloned().collect();
        let mut seen: HashSet<K> = HashSet::new();
        let mut records = Vec::new();

        let stream_result = self.source.load(keys).await;
        let mut stream = match stream_result {
            Ok(stream) => stream,
            Err(err) => {
                self.metrics.increment(
                    Family::DataSourceLoads,
                    &self.cache_name,
                    Operation::Get,
                    Status::Error,
                );
                tracing::error!(cache_name = %self.cache_name, error = %err, "data source load error");
                return Err(err);
            }
        };

        while let Some(item) = stream.next().await {
            match item {
                Ok(record) => {
                    if !requested.contains(&record.key) {
                        tracing::warn!(cache_name = %self.cache_name, "data source emitted a key outside the request set");
                        self.metrics.increment(
                            Family::DataSourceKeyLoads,
                            &self.cache_name,
                            Operation::Get,
                            Status::Error,
                        );
                        continue;
                    }
                    // TTL non-negativity is enforced by the type system:
                    // `Duration` cannot represent a negative value.
                    seen.insert(record.key.clone());
                    self.metrics.increment(
                        Family::DataSourceKeyLoads,
                        &self.cache_name,
                        Operation::Get,
                        Status::Hit,
                    );
                    records.push(record);
                }
                Err(err) => {
                    tracing::warn!(cache_name = %self.cache_name, error = %err, "data source per-record error");
                    self.metrics.increment(
                        Family::DataSourceKeyLoads,
                        &self.cache_name,
                        Operation::Get,
                        Status::Error,
                    );
                }
            }
        }

        self.metrics.increment(
            Family::DataSourceLoads,
            &self.cache_name,
            Operation::Get,
            Status::Ok,
        );

        let key_misses: Vec<K> = keys.iter().filter(|k| !seen.contains(k)).cloned().collect();
        for _ in &key_misses {
            self.metrics.increment(
                Family::DataSourceKeyLoads,
                &self.cache_name,
                Operation::Get,
                Status::Miss,
            );
        }

        Ok(LoadOutcome { records, key_misses })
    }
}
