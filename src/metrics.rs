//! Metrics sink / logger façade.
//!
//! Tagged counters and a gauge, plus the `tracing` spans/events the rest of
//! the crate emits directly. The metrics *backend* (where counters end up,
//! Prometheus, statsd, whatever) is the caller's concern; this module only
//! defines the tag vocabulary and a trait the caller implements to receive
//! updates.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which cache tier or collaborator a counter update is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    LocalCacheRequests,
    LocalCacheCount,
    DistributedCacheRequests,
    DataSourceLoads,
    DataSourceKeyLoads,
}

/// The operation a counter update is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Set,
    Del,
}

/// The outcome a counter update is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Hit,
    Miss,
    Error,
}

/// A sink for tagged counters and one gauge. Implement this to wire the
/// coordination core into a real metrics backend.
pub trait MetricsSink: Send + Sync + fmt::Debug {
    /// Increment a tagged counter by one.
    fn increment(&self, family: Family, cache_name: &str, operation: Operation, status: Status);

    /// Record the current value of the `local_cache.count` gauge.
    fn set_gauge(&self, cache_name: &str, value: u64);

    /// Report a user-code error (L2 operation, serializer, data source)
    /// that was swallowed rather than propagated to the caller.
    fn log_swallowed_error(&self, cache_name: &str, context: &str, error: &anyhow::Error) {
        tracing::warn!(cache_name, context, error = %error, "swallowed cache error");
    }
}

/// A sink that discards everything. Useful as a default when the caller
/// doesn't care about metrics.
#[derive(Debug, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn increment(&self, _family: Family, _cache_name: &str, _operation: Operation, _status: Status) {}

    fn set_gauge(&self, _cache_name: &str, _value: u64) {}
}

/// A sink that emits `tracing` events for every update and keeps
/// `AtomicU64` tallies queryable via [`TracingMetricsSink::snapshot`].
/// Intended for local development and tests, not production metrics
/// collection — a real deployment should implement [`MetricsSink`] against
/// its actual metrics backend.
#[derive(Debug, Default)]
pub struct TracingMetricsSink {
    local_requests: AtomicU64,
    local_hits: AtomicU64,
    local_misses: AtomicU64,
    local_errors: AtomicU64,
    local_count: AtomicU64,
    distributed_requests: AtomicU64,
    distributed_hits: AtomicU64,
    distributed_misses: AtomicU64,
    distributed_errors: AtomicU64,
    source_loads: AtomicU64,
    source_load_errors: AtomicU64,
    source_key_hits: AtomicU64,
    source_key_misses: AtomicU64,
    source_key_errors: AtomicU64,
}

/// A point-in-time read of [`TracingMetricsSink`]'s counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub local_requests: u64,
    pub local_hits: u64,
    pub local_misses: u64,
    pub local_errors: u64,
    pub local_count: u64,
    pub distributed_requests: u64,
    pub distributed_hits: u64,
    pub distributed_misses: u64,
    pub distributed_errors: u64,
    pub source_loads: u64,
    pub source_load_errors: u64,
    pub source_key_hits: u64,
    pub source_key_misses: u64,
    pub source_key_errors: u64,
}

impl TracingMetricsSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            local_requests: self.local_requests.load(Ordering::Relaxed),
            local_hits: self.local_hits.load(Ordering::Relaxed),
            local_misses: self.local_misses.load(Ordering::Relaxed),
            local_errors: self.local_errors.load(Ordering::Relaxed),
            local_count: self.local_count.load(Ordering::Relaxed),
            distributed_requests: self.distributed_requests.load(Ordering::Relaxed),
            distributed_hits: self.distributed_hits.load(Ordering::Relaxed),
            distributed_misses: self.distributed_misses.load(Ordering::Relaxed),
            distributed_errors: self.distributed_errors.load(Ordering::Relaxed),
            source_loads: self.source_loads.load(Ordering::Relaxed),
            source_load_errors: self.source_load_errors.load(Ordering::Relaxed),
            source_key_hits: self.source_key_hits.load(Ordering::Relaxed),
            source_key_misses: self.source_key_misses.load(Ordering::Relaxed),
            source_key_errors: self.source_key_errors.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for TracingMetricsSink {
    fn increment(&self, family: Family, cache_name: &str, operation: Operation, status: Status) {
        tracing::trace!(
            cache_name,
            ?family,
            ?operation,
            ?status,
            "cache metric"
        );
        match family {
            Family::LocalCacheRequests => {
                self.local_requests.fetch_add(1, Ordering::Relaxed);
                match status {
                    Status::Hit => self.local_hits.fetch_add(1, Ordering::Relaxed),
                    Status::Miss => self.local_misses.fetch_add(1, Ordering::Relaxed),
                    Status::Error => self.local_errors.fetch_add(1, Ordering::Relaxed),
                    Status::Ok => 0,
                };
            }
            Family::DistributedCacheRequests => {
                self.distributed_requests.fetch_add(1, Ordering::Relaxed);
                match status {
                    Status::Hit => self.distributed_hits.fetch_add(1, Ordering::Relaxed),
                    Status::Miss => self.distributed_misses.fetch_add(1, Ordering::Relaxed),
                    Status::Error => self.distributed_errors.fetch_add(1, Ordering::Relaxed),
                    Status::Ok => 0,
                };
            }
            Family::DataSourceLoads => {
                self.source_loads.fetch_add(1, Ordering::Relaxed);
                if status == Status::Error {
                    self.source_load_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
            Family::DataSourceKeyLoads => match status {
                Status::Hit | Status::Ok => self.source_key_hits.fetch_add(1, Ordering::Relaxed),
                Status::Miss => self.source_key_misses.fetch_add(1, Ordering::Relaxed),
                Status::Error => self.source_key_errors.fetch_add(1, Ordering::Relaxed),
            },
            Family::LocalCacheCount => {}
        };
    }

    fn set_gauge(&self, cache_name: &str, value: u64) {
        tracing::trace!(cache_name, value, "local_cache.count");
        self.local_count.store(value, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_everything() {
        let sink = NoopMetricsSink;
        sink.increment(Family::LocalCacheRequests, "widgets", Operation::Get, Status::Hit);
        sink.set_gauge("widgets", 10);
    }

    #[test]
    fn tracing_sink_tallies_hits_and_misses() {
        let sink = TracingMetricsSink::new();
        sink.increment(Family::LocalCacheRequests, "widgets", Operation::Get, Status::Hit);
        sink.increment(Family::LocalCacheRequests, "widgets", Operation::Get, Status::Miss);
        sink.set_gauge("widgets", 42);

        let snap = sink.snapshot();
        assert_eq!(snap.local_hits, 1);
        assert_eq!(snap.local_misses, 1);
        assert_eq!(snap.local_count, 42);
    }
}
