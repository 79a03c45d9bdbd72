//! `peek`: L1-only, never touches the source, enqueues stale/missing keys
//! for background refresh.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tiered_cache_core::testutil::{InMemoryDataSource, InMemoryL1Store, InMemoryL2Store, JsonSerializer};
use tiered_cache_core::{CacheConfig, Coordinator, NoopMetricsSink};

#[tokio::test]
async fn peek_on_empty_l1_returns_none_and_never_touches_source() {
    let source: Arc<InMemoryDataSource<i64, i64>> = Arc::new(InMemoryDataSource::new(HashMap::new()));
    let config = CacheConfig::builder("widgets")
        .time_to_live(Duration::from_secs(60))
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

    let value = coordinator.peek(&7).await;
    assert_eq!(value, None);
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn peek_returns_fresh_l1_value_without_enqueuing_refresh() {
    let mut seed = HashMap::new();
    seed.insert(4_i64, (44_i64, Duration::from_secs(3600)));
    let source = Arc::new(InMemoryDataSource::new(seed));
    let config = CacheConfig::builder("widgets")
        .time_to_live(Duration::from_secs(60))
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

    // Warm L1 via a real get first.
    let (found, value) = coordinator.get(&4).await;
    assert!(found);
    assert_eq!(value, 44);

    let peeked = coordinator.peek(&4).await;
    assert_eq!(peeked, Some(44));
}
