//! Bulk preload/refresh: chunking property and write-through across both
//! tiers for a batch of keys.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tiered_cache_core::testutil::{InMemoryDataSource, InMemoryL1Store, InMemoryL2Store, JsonSerializer};
use tiered_cache_core::{CacheConfig, Coordinator, NoopMetricsSink};

#[tokio::test]
async fn preload_of_n_keys_issues_ceil_n_over_batch_size_loads() {
    let mut seed = HashMap::new();
    for k in 0..25_i64 {
        seed.insert(k, (k * 10, Duration::from_secs(3600)));
    }
    let source = Arc::new(InMemoryDataSource::new(seed));

    let config = CacheConfig::builder("widgets")
        .time_to_live(Duration::from_secs(60))
        .batch_size(10)
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

    let keys: Vec<i64> = (0..25).collect();
    coordinator.preload(&keys).await;

    // ceil(25 / 10) = 3
    assert_eq!(source.call_count(), 3);

    for k in 0..25_i64 {
        let (found, value) = coordinator.get(&k).await;
        assert!(found, "key {k} should have been preloaded");
        assert_eq!(value, k * 10);
    }
    // None of the follow-up gets should have needed the source again.
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn refresh_batch_skips_source_for_keys_with_l2_errors() {
    let mut seed = HashMap::new();
    seed.insert(1_i64, (100_i64, Duration::from_secs(3600)));
    seed.insert(2_i64, (200_i64, Duration::from_secs(3600)));
    let source = Arc::new(InMemoryDataSource::new(seed));
    let l2 = Arc::new(InMemoryL2Store::new());

    let dist_key_1 = tiered_cache_core::framing::build_distributed_key("", "widgets", 1, "1");
    l2.force_error(&dist_key_1);

    let config = CacheConfig::builder("widgets")
        .time_to_live(Duration::from_secs(60))
        .build()
        .unwrap();

    let coordinator = Coordinator::new(
        config,
        Arc::new(InMemoryL1Store::new()),
        l2,
        source.clone(),
        Arc::new(JsonSerializer::new(1)),
        Arc::new(NoopMetricsSink),
    );

    coordinator.refresh_batch(&[1, 2]).await;

    // Key 1's L2 read errored, so it must be excluded from the batch's
    // source request; key 2 was an L2 miss and should have been loaded.
    let calls = source.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0], vec![2]);

    let (found, value) = coordinator.get(&2).await;
    assert!(found);
    assert_eq!(value, 200);
}
