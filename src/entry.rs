//! Cache-entry record.
//!
//! Opaque to callers of the public API; mutated only by the coordinator.

use std::time::{Duration, SystemTime};

/// The unit stored by both cache tiers.
///
/// `has_value` distinguishes "source returned nothing" from a real value;
/// an entry without a value is legal and cacheable (policy-gated by
/// `CacheConfig::cache_data_source_misses`). Equality compares only
/// `has_value`/`value` — timing fields are ignored, so two entries that
/// differ only in freshness compare equal (used by the coordinator to
/// decide "same value, just extend lifetime").
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    has_value: bool,
    value: Option<V>,
    creation_time: SystemTime,
    time_to_live: Duration,
}

impl<V> CacheEntry<V> {
    /// Build an entry carrying a real value.
    pub fn with_value(value: V, creation_time: SystemTime, time_to_live: Duration) -> Self {
        Self {
            has_value: true,
            value: Some(value),
            creation_time,
            time_to_live,
        }
    }

    /// Build an entry recording "the source returned nothing for this key".
    pub fn absent(creation_time: SystemTime, time_to_live: Duration) -> Self {
        Self {
            has_value: false,
            value: None,
            creation_time,
            time_to_live,
        }
    }

    pub fn has_value(&self) -> bool {
        self.has_value
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<V> {
        self.value
    }

    pub fn creation_time(&self) -> SystemTime {
        self.creation_time
    }

    pub fn time_to_live(&self) -> Duration {
        self.time_to_live
    }

    /// An entry is stale once `now` passes `creation_time + time_to_live`.
    /// Stale entries remain retainable as a fallback.
    pub fn is_stale(&self, now: SystemTime) -> bool {
        match self.creation_time.checked_add(self.time_to_live) {
            Some(expiry) => now > expiry,
            // Overflowed durations can't meaningfully expire.
            None => false,
        }
    }

    /// Value if present, else `V::default()` — used at the public `get`/
    /// `peek` boundary where callers see `(found, value)` rather than an
    /// `Option`.
    pub fn value_or_default(&self) -> V
    where
        V: Clone + Default,
    {
        self.value.clone().unwrap_or_default()
    }

    /// Rebuild this entry with new timing fields but the same
    /// `has_value`/`value`. Used for the equal-value extension: when an L1
    /// write would store a value that compares equal to what's already
    /// resident, the coordinator reuses the existing `value` (not the
    /// incoming one) so that callers storing `Arc<T>` values preserve
    /// pointer identity across the "extension".
    pub fn retimed(&self, creation_time: SystemTime, time_to_live: Duration) -> Self
    where
        V: Clone,
    {
        Self {
            has_value: self.has_value,
            value: self.value.clone(),
            creation_time,
            time_to_live,
        }
    }
}

/// Equality ignores timing fields — only `has_value`/`value` matter.
impl<V: PartialEq> PartialEq for CacheEntry<V> {
    fn eq(&self, other: &Self) -> bool {
        self.has_value == other.has_value && self.value == other.value
    }
}

impl<V: Eq> Eq for CacheEntry<V> {}
