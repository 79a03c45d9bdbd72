//! Tiered cache coordination core
//!
//! A read-only, two-tier caching fabric that sits between application code
//! and a (typically slow) source of truth. For each request it yields the
//! freshest value it can obtain cheaply, while shielding the source of
//! truth from both load spikes and transient failures of L1/L2.
//!
//! - **L1**: a caller-supplied in-process store, wrapped with
//!   instrumentation ([`L1Adapter`](l1::L1Adapter)).
//! - **L2**: a caller-supplied byte-level distributed store, wrapped with
//!   record framing and uniform error downgrading
//!   ([`L2FramingAdapter`](l2::L2FramingAdapter)).
//! - **Data source**: the upstream source of truth, consulted only when
//!   both tiers miss or are stale.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use tiered_cache_core::{
//!     CacheConfig, Coordinator, NoopMetricsSink,
//!     testutil::{InMemoryDataSource, InMemoryL1Store, InMemoryL2Store, JsonSerializer},
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CacheConfig::builder("widgets")
//!         .time_to_live(Duration::from_secs(60))
//!         .build()?;
//!
//!     let mut seed = HashMap::new();
//!     seed.insert(4_i64, (44_i64, Duration::from_secs(3600)));
//!
//!     let coordinator = Coordinator::new(
//!         config,
//!         Arc::new(InMemoryL1Store::new()),
//!         Arc::new(InMemoryL2Store::new()),
//!         Arc::new(InMemoryDataSource::new(seed)),
//!         Arc::new(JsonSerializer::new(1)),
//!         Arc::new(NoopMetricsSink),
//!     );
//!
//!     let (found, value) = coordinator.get(&4).await;
//!     assert!(found);
//!     assert_eq!(value, 44);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Scope
//!
//! In scope: tier coordination, staleness/eviction policy, request
//! coalescing, background batching, failure-mode decisions, distributed
//! record framing, observability hooks. Out of scope: concrete L1/L2/data
//! source implementations, the value serializer's wire format, the metrics
//! backend, and configuration *loading* (only in-process construction is
//! provided). Non-goals: write-through/write-back semantics, cross-node
//! invalidation, strong consistency, precise LRU/LFU eviction, L2
//! replication.

pub mod batcher;
pub mod config;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod framing;
pub mod l1;
pub mod l2;
pub mod metrics;
pub mod singleflight;
pub mod source;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use coordinator::Coordinator;
pub use entry::CacheEntry;
pub use error::CacheError;
pub use metrics::{Family, MetricsSink, MetricsSnapshot, NoopMetricsSink, Operation, Status, TracingMetricsSink};
pub use traits::{DataSource, L1Store, L2RawStatus, L2Store, Serializer, SourceRecord, SourceStream};

pub use async_trait::async_trait;
