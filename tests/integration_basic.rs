//! End-to-end scenarios from the coordinator's single-key decision graph:
//! fresh/stale L2 hits, the `cache_data_source_misses` toggle, and the
//! L2-error fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tiered_cache_core::framing::build_distributed_key;
use tiered_cache_core::testutil::{InMemoryDataSource, InMemoryL1Store, InMemoryL2Store, JsonSerializer};
use tiered_cache_core::{CacheConfig, Coordinator, NoopMetricsSink};

fn config(name: &str, cache_misses: bool) -> CacheConfig {
    CacheConfig::builder(name)
        .time_to_live(Duration::from_secs(60))
        .cache_data_source_misses(cache_misses)
        .build()
        .unwrap()
}

#[tokio::test]
async fn scenario_1_fresh_l2_hit_skips_source() {
    let mut seed = HashMap::new();
    seed.insert(4_i64, (44_i64, Duration::from_secs(3600)));
    let source = Arc::new(InMemoryDataSource::new(seed));

    let coordinator = Coordinator::new(
        config("widgets", false),
        Arc::new(InMemoryL1Store::new()),
        Arc::new(InMemoryL2Store::new()),
        source.clone(),
        Arc::new(JsonSerializer::new(1)),
        Arc::new(NoopMetricsSink),
    );

    // First call goes through the source (both tiers start empty) and
    // populates L1 + L2.
    let (found, value) = coordinator.get(&4).await;
    assert!(found);
    assert_eq!(value, 44);
    assert_eq!(source.call_count(), 1);

    // Drop the source's ability to serve 4 at all: if it's called again
    // this assertion would fail with a key miss instead of 44.
    source.remove_seed(&4);

    let (found, value) = coordinator.get(&4).await;
    assert!(found);
    assert_eq!(value, 44);
    assert_eq!(source.call_count(), 1, "fresh L1 hit must not re-consult the source");
}

#[tokio::test]
async fn scenario_2_stale_l2_hit_refreshes_from_source() {
    let mut seed = HashMap::new();
    seed.insert(5_i64, (55_i64, Duration::from_millis(1)));
    let source = Arc::new(InMemoryDataSource::new(seed));

    let coordinator = Coordinator::new(
        config("widgets", false),
        Arc::new(InMemoryL1Store::new()),
        Arc::new(InMemoryL2Store::new()),
        source.clone(),
        Arc::new(JsonSerializer::new(1)),
        Arc::new(NoopMetricsSink),
    );

    let (found, value) = coordinator.get(&5).await;
    assert!(found);
    assert_eq!(value, 55);

    tokio::time::sleep(Duration::from_millis(20)).await;
    source.set_seed(5, 555, Duration::from_secs(5 * 3600));

    let (found, value) = coordinator.get(&5).await;
    assert!(found);
    assert_eq!(value, 555);
    assert_eq!(source.call_count(), 2);
}

#[tokio::test]
async fn scenario_3_cached_miss_when_enabled() {
    let source: Arc<InMemoryDataSource<i64, i64>> = Arc::new(InMemoryDataSource::new(HashMap::new()));

    let coordinator = Coordinator::new(
        config("widgets", true),
        Arc::new(InMemoryL1Store::new()),
        Arc::new(InMemoryL2Store::new()),
        source.clone(),
        Arc::new(JsonSerializer::new(1)),
        Arc::new(NoopMetricsSink),
    );

    let (found, value) = coordinator.get(&2).await;
    assert!(!found);
    assert_eq!(value, 0);
    assert_eq!(source.call_count(), 1);

    // A fresh value-less L1 entry now exists; a second get must not
    // re-consult the source.
    let (found, _) = coordinator.get(&2).await;
    assert!(!found);
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn scenario_4_uncached_miss_deletes_stale_entry() {
    let mut seed = HashMap::new();
    seed.insert(9_i64, (99_i64, Duration::from_millis(1)));
    let source = Arc::new(InMemoryDataSource::new(seed));

    let coordinator = Coordinator::new(
        config("widgets", false),
        Arc::new(InMemoryL1Store::new()),
        Arc::new(InMemoryL2Store::new()),
        source.clone(),
        Arc::new(JsonSerializer::new(1)),
        Arc::new(NoopMetricsSink),
    );

    let (found, value) = coordinator.get(&9).await;
    assert!(found);
    assert_eq!(value, 99);

    tokio::time::sleep(Duration::from_millis(20)).await;
    source.remove_seed(&9);

    let (found, value) = coordinator.get(&9).await;
    assert!(!found);
    assert_eq!(value, 0);
}

#[tokio::test]
async fn scenario_5_l2_error_skips_source_entirely() {
    let mut seed = HashMap::new();
    seed.insert(5_i64, (10_i64, Duration::from_secs(5 * 3600)));
    let source = Arc::new(InMemoryDataSource::new(seed));
    let l2 = Arc::new(InMemoryL2Store::new());

    let dist_key = build_distributed_key("", "widgets", 1, "5");
    l2.force_error(&dist_key);

    let coordinator = Coordinator::new(
        config("widgets", false),
        Arc::new(InMemoryL1Store::new()),
        l2,
        source.clone(),
        Arc::new(JsonSerializer::new(1)),
        Arc::new(NoopMetricsSink),
    );

    let (found, value) = coordinator.get(&5).await;
    assert!(!found);
    assert_eq!(value, 0);
    assert_eq!(source.call_count(), 0, "an L2 error must short-circuit before the source is ever consulted");
}
