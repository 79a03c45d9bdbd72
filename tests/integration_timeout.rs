//! A source load that outlives `load_timeout` is treated as a load error,
//! not an indefinite hang.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;

use tiered_cache_core::testutil::{InMemoryL1Store, InMemoryL2Store, JsonSerializer};
use tiered_cache_core::{CacheConfig, Coordinator, DataSource, NoopMetricsSink, SourceRecord, SourceStream};

/// A data source whose `load` never resolves within the test's timeout
/// window, so every call to it should be cut off by `load_timeout`.
struct HangingDataSource {
    calls: AtomicUsize,
}

impl HangingDataSource {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl DataSource<i64, i64> for HangingDataSource {
    async fn load<'a>(&'a self, _keys: &'a [i64]) -> anyhow::Result<SourceStream<'a, i64, i64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        let records: Vec<anyhow::Result<SourceRecord<i64, i64>>> = Vec::new();
        Ok(Box::pin(stream::iter(records)))
    }
}

#[tokio::test(start_paused = true)]
async fn a_hanging_source_load_times_out_instead_of_hanging_the_caller() {
    let source = Arc::new(HangingDataSource::new());

    let config = CacheConfig::builder("widgets")
        .time_to_live(Duration::from_secs(60))
        .load_timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let coordinator = Coordinator::new(
        config,
        Arc::new(InMemoryL1Store::new()),
        Arc::new(InMemoryL2Store::new()),
        source.clone(),
        Arc::new(JsonSerializer::new(1)),
        Arc::new(NoopMetricsSink),
    );

    let (found, value) = coordinator.get(&1).await;
    assert!(!found);
    assert_eq!(value, 0);
    assert_eq!(source.calls.load(Ordering::SeqCst), 1);
}
